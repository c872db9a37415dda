//! Show whether a sync session is active on this host.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tether_sync_client::{SessionContext, StatusReport};

use super::format_duration;

/// Run the status command.
///
/// Read-only apart from clearing a record left by a dead process; never
/// creates files.
pub async fn run(config_dir: &Path, json: bool) -> Result<()> {
    let context = SessionContext::new(config_dir);
    let report = context.status().report(Utc::now()).await;

    if json {
        let encoded =
            serde_json::to_string_pretty(&report).context("Failed to encode status report")?;
        println!("{encoded}");
    } else {
        print!("{}", render(&report));
    }
    Ok(())
}

/// Human-readable rendering of a report.
pub(crate) fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    match report {
        StatusReport::Inactive => {
            out.push_str("Status: inactive\n");
            out.push('\n');
            out.push_str("No sync session is running. Start one with 'tether connect'.\n");
        }
        StatusReport::Stale {
            descriptor,
            heartbeat_age,
        } => {
            out.push_str("Status: stale\n");
            out.push_str(&format!("  Session:        {}\n", descriptor.session_id));
            out.push_str(&format!("  Server:         {}\n", descriptor.server));
            out.push_str(&format!("  Owner pid:      {}\n", descriptor.owner_pid));
            out.push_str(&format!(
                "  Last heartbeat: {} ago\n",
                format_duration(*heartbeat_age)
            ));
            out.push('\n');
            out.push_str("The owning process is alive but has stopped sending heartbeats.\n");
        }
        StatusReport::Active {
            descriptor,
            uptime,
            heartbeat_age,
            quality,
        } => {
            out.push_str("Status: active\n");
            out.push_str(&format!("  Session:        {}\n", descriptor.session_id));
            out.push_str(&format!("  Server:         {}\n", descriptor.server));
            out.push_str(&format!(
                "  Device:         {} ({})\n",
                descriptor.device_name, descriptor.device_type
            ));
            out.push_str(&format!("  Owner pid:      {}\n", descriptor.owner_pid));
            out.push_str(&format!(
                "  Connected:      {} (up {})\n",
                format_timestamp(descriptor.connected_at),
                format_duration(*uptime)
            ));
            out.push_str(&format!(
                "  Last heartbeat: {} ago\n",
                format_duration(*heartbeat_age)
            ));
            out.push_str(&format!("  Quality:        {quality}\n"));
        }
    }
    out
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
