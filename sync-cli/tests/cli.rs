//! End-to-end tests for the `tether` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn tether(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tether").unwrap();
    cmd.arg("--config-dir")
        .arg(config_dir)
        .env_remove("TETHER_TOKEN")
        .env_remove("TETHER_SERVER")
        .env_remove("TETHER_CONFIG_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Pid of a child that has already exited and been reaped.
#[cfg(unix)]
fn exited_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[cfg(unix)]
fn write_descriptor(dir: &Path, pid: u32) {
    let state = serde_json::json!({
        "active_connection": {
            "connected": true,
            "session_id": "sess_xyz",
            "server": "127.0.0.1:7420",
            "connected_at": "2024-01-11T19:06:40Z",
            "device_type": "desktop",
            "device_name": "workstation",
            "last_heartbeat": "2024-01-11T19:06:40Z",
            "pid": pid
        }
    });
    std::fs::write(
        dir.join("sync_state.json"),
        serde_json::to_vec_pretty(&state).unwrap(),
    )
    .unwrap();
}

// ===========================================
// status
// ===========================================

#[test]
fn status_on_fresh_host_is_inactive_and_creates_nothing() {
    let dir = tempdir().unwrap();

    tether(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: inactive"));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn status_json_reports_state() {
    let dir = tempdir().unwrap();

    tether(dir.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""state": "inactive""#));
}

#[cfg(unix)]
#[test]
fn status_clears_crashed_owner_but_leaves_lock() {
    let dir = tempdir().unwrap();
    let pid = exited_pid();
    write_descriptor(dir.path(), pid);
    std::fs::write(dir.path().join("sync.lock"), pid.to_string()).unwrap();

    tether(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: inactive"));

    let state = std::fs::read_to_string(dir.path().join("sync_state.json")).unwrap();
    assert!(!state.contains("sess_xyz"));
    assert!(dir.path().join("sync.lock").exists());
}

// ===========================================
// connect
// ===========================================

#[test]
fn connect_without_token_explains_how_to_log_in() {
    let dir = tempdir().unwrap();

    tether(dir.path())
        .args(["connect", "--server", "127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not logged in"));
}

#[cfg(unix)]
#[test]
fn connect_while_locked_leaves_store_untouched() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("credentials.json"), r#"{"token":"tok"}"#).unwrap();
    std::fs::write(dir.path().join("sync.lock"), exited_pid().to_string()).unwrap();

    tether(dir.path())
        .args(["connect", "--server", "127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already running"))
        .stderr(predicate::str::contains("sync.lock"));

    assert!(!dir.path().join("sync_state.json").exists());
    assert!(dir.path().join("sync.lock").exists());
}

#[test]
fn connect_rejects_unknown_device_type() {
    let dir = tempdir().unwrap();

    tether(dir.path())
        .args(["connect", "--device-type", "toaster"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("toaster"));
}
