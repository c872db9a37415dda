//! Liveness Oracle: is the process that owns a descriptor still running?

use std::collections::HashSet;

/// Answers whether a pid refers to a running process.
pub trait LivenessOracle: Send + Sync {
    /// Whether `pid` is alive.
    fn is_alive(&self, pid: u32) -> bool;
}

/// Probes with signal 0 (`kill(pid, 0)`).
///
/// `EPERM` counts as dead: a process we cannot signal is not one of ours.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalOracle;

impl LivenessOracle for SignalOracle {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == std::process::id() {
            return true;
        }
        probe(pid)
    }
}

#[cfg(unix)]
fn probe(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Zero and negative pids address process groups, not a process.
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return false,
    };

    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // Inconclusive; assume alive rather than clobber a live session.
        Err(Errno::ENOSYS) | Err(Errno::EOPNOTSUPP) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn probe(_pid: u32) -> bool {
    true
}

/// Fixed answer set, for tests. The current process is always alive.
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    alive: HashSet<u32>,
}

impl StaticOracle {
    /// Oracle where only the current process is alive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle where `pids` (and the current process) are alive.
    pub fn with_alive(pids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            alive: pids.into_iter().collect(),
        }
    }
}

impl LivenessOracle for StaticOracle {
    fn is_alive(&self, pid: u32) -> bool {
        pid == std::process::id() || self.alive.contains(&pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        assert!(SignalOracle.is_alive(std::process::id()));
    }

    #[test]
    fn pid_zero_is_dead() {
        assert!(!SignalOracle.is_alive(0));
    }

    #[cfg(unix)]
    #[test]
    fn out_of_range_pid_is_dead() {
        assert!(!SignalOracle.is_alive(u32::MAX));
        assert!(!SignalOracle.is_alive(i32::MAX as u32));
    }

    #[cfg(unix)]
    #[test]
    fn exited_child_is_dead() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!SignalOracle.is_alive(pid));
    }

    #[cfg(unix)]
    #[test]
    fn running_child_is_alive() {
        let mut child = std::process::Command::new("sleep").arg("5").spawn().unwrap();
        assert!(SignalOracle.is_alive(child.id()));
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn static_oracle_answers_from_set() {
        let oracle = StaticOracle::with_alive([10, 20]);
        assert!(oracle.is_alive(10));
        assert!(!oracle.is_alive(30));
        assert!(StaticOracle::new().is_alive(std::process::id()));
    }
}
