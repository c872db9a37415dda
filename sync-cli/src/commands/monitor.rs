//! Watch the session status until interrupted.

use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tether_sync_client::{SessionContext, StatusReport};
use tether_sync_core::ConnectionQuality;
use tokio::time::MissedTickBehavior;

/// What a status line is keyed on; a new line is printed when it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Observed {
    Inactive,
    Stale(String),
    Active(String, ConnectionQuality),
}

impl Observed {
    fn from_report(report: &StatusReport) -> Self {
        match report {
            StatusReport::Inactive => Observed::Inactive,
            StatusReport::Stale { descriptor, .. } => {
                Observed::Stale(descriptor.session_id.to_string())
            }
            StatusReport::Active {
                descriptor,
                quality,
                ..
            } => Observed::Active(descriptor.session_id.to_string(), *quality),
        }
    }

    fn describe(&self) -> String {
        match self {
            Observed::Inactive => "inactive".to_string(),
            Observed::Stale(session) => format!("stale (session {session})"),
            Observed::Active(session, quality) => {
                format!("active (session {session}, quality {quality})")
            }
        }
    }
}

/// Run the monitor command.
pub async fn run(config_dir: &Path, interval_secs: u64) -> Result<()> {
    let context = SessionContext::new(config_dir);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = None;

    println!("Watching session status (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(line) = observe(&context, &mut last).await {
                    println!("{line}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Check once; returns a line to print if the observed state changed.
async fn observe(context: &SessionContext, last: &mut Option<Observed>) -> Option<String> {
    let now = Utc::now();
    let observed = Observed::from_report(&context.status().report(now).await);
    if last.as_ref() == Some(&observed) {
        return None;
    }
    let line = format!("[{}] {}", now.format("%H:%M:%S"), observed.describe());
    *last = Some(observed);
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tether_sync_client::StaticOracle;
    use tether_sync_types::{ConnectionDescriptor, DeviceType, SessionId};

    #[tokio::test]
    async fn prints_only_on_change() {
        let dir = tempdir().unwrap();
        let context =
            SessionContext::with_oracle(dir.path(), Arc::new(StaticOracle::with_alive([4242])));
        let mut last = None;

        let first = observe(&context, &mut last).await.unwrap();
        assert!(first.ends_with("inactive"));
        assert!(observe(&context, &mut last).await.is_none());

        context
            .store()
            .set_connection(ConnectionDescriptor::new(
                SessionId::new("sess_xyz"),
                "127.0.0.1:7420",
                DeviceType::Desktop,
                "workstation",
                4242,
                Utc::now(),
            ))
            .await
            .unwrap();

        let active = observe(&context, &mut last).await.unwrap();
        assert!(active.contains("active (session sess_xyz, quality good)"));
        assert!(observe(&context, &mut last).await.is_none());

        context.store().clear().await.unwrap();
        let gone = observe(&context, &mut last).await.unwrap();
        assert!(gone.ends_with("inactive"));
    }

    #[test]
    fn stale_and_active_are_distinct() {
        let stale = Observed::Stale("s1".into());
        let active = Observed::Active("s1".into(), ConnectionQuality::Good);
        assert_ne!(stale, active);
        assert_eq!(stale.describe(), "stale (session s1)");
    }
}
