//! Heartbeat health rules.
//!
//! A session is judged purely by the age of its last recorded heartbeat.
//! Past the staleness threshold the session is reported as stale; below it
//! the age is bucketed into a [`ConnectionQuality`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Heartbeat age below which quality is good.
pub const GOOD_THRESHOLD: Duration = Duration::from_secs(30);

/// Heartbeat age below which quality is fair.
pub const FAIR_THRESHOLD: Duration = Duration::from_secs(60);

/// Heartbeat age beyond which a session is stale.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(120);

/// Quality bucket for a fresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    /// Heartbeat within one interval.
    Good,
    /// One heartbeat missed or late.
    Fair,
    /// Several heartbeats missed, not yet stale.
    Degraded,
}

impl ConnectionQuality {
    /// Lowercase name as printed by `status`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionQuality::Good => "good",
            ConnectionQuality::Fair => "fair",
            ConnectionQuality::Degraded => "degraded",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of assessing a heartbeat age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Within the staleness threshold.
    Fresh(ConnectionQuality),
    /// Older than the staleness threshold.
    Stale,
}

impl Health {
    /// Whether the session counts as active.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Health::Fresh(_))
    }
}

/// Thresholds used to classify a heartbeat age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    /// Upper bound (exclusive) for [`ConnectionQuality::Good`].
    pub good: Duration,
    /// Upper bound (exclusive) for [`ConnectionQuality::Fair`].
    pub fair: Duration,
    /// Ages strictly greater than this are stale.
    pub stale: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            good: GOOD_THRESHOLD,
            fair: FAIR_THRESHOLD,
            stale: STALE_THRESHOLD,
        }
    }
}

impl HealthThresholds {
    /// Classify a heartbeat age.
    pub fn assess(&self, heartbeat_age: Duration) -> Health {
        if heartbeat_age > self.stale {
            Health::Stale
        } else if heartbeat_age < self.good {
            Health::Fresh(ConnectionQuality::Good)
        } else if heartbeat_age < self.fair {
            Health::Fresh(ConnectionQuality::Fair)
        } else {
            Health::Fresh(ConnectionQuality::Degraded)
        }
    }

    /// Whether the age exceeds the staleness threshold.
    pub fn is_stale(&self, heartbeat_age: Duration) -> bool {
        heartbeat_age > self.stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn quality_buckets() {
        let t = HealthThresholds::default();
        assert_eq!(t.assess(secs(0)), Health::Fresh(ConnectionQuality::Good));
        assert_eq!(t.assess(secs(29)), Health::Fresh(ConnectionQuality::Good));
        assert_eq!(t.assess(secs(30)), Health::Fresh(ConnectionQuality::Fair));
        assert_eq!(t.assess(secs(59)), Health::Fresh(ConnectionQuality::Fair));
        assert_eq!(t.assess(secs(60)), Health::Fresh(ConnectionQuality::Degraded));
        assert_eq!(t.assess(secs(120)), Health::Fresh(ConnectionQuality::Degraded));
    }

    #[test]
    fn stale_after_two_minutes() {
        let t = HealthThresholds::default();
        assert!(!t.is_stale(secs(120)));
        assert!(t.is_stale(secs(121)));
        assert_eq!(t.assess(secs(600)), Health::Stale);
        assert!(!Health::Stale.is_fresh());
    }

    #[test]
    fn quality_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionQuality::Degraded).unwrap();
        assert_eq!(json, "\"degraded\"");
        assert_eq!(ConnectionQuality::Fair.to_string(), "fair");
    }
}
