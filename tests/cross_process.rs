//! Cross-process locking tests.
//!
//! These spawn the `hasp` binary (`hold`, `run`, `status`) as a second
//! process so contention is arbitrated by the OS advisory lock, not by any
//! in-process registry. The `hold` command prints `held` once the lock is
//! granted, which the tests use to synchronize instead of sleeping.

use hasp::error::HaspError;
use hasp::exit_codes;
use hasp::locks::{FileLockManager, sidecar_path};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

fn spawn_holder(path: &Path, shared: bool, duration_ms: u64) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hasp"));
    cmd.arg("hold").arg(path);
    if shared {
        cmd.arg("--shared");
    }
    cmd.arg("--duration-ms")
        .arg(duration_ms.to_string())
        .stdout(Stdio::piped());

    let mut child = cmd.spawn().expect("spawn hasp hold");

    // Wait for the grant announcement before returning.
    let stdout = child.stdout.take().expect("child stdout");
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("read held line");
    assert_eq!(line.trim(), "held");

    child
}

/// Scenario B: an exclusive lock in one process rejects a zero-timeout shared
/// probe from another process until it is released.
#[test]
fn exclusive_holder_blocks_other_process_until_release() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("bar");

    let mut child = spawn_holder(&path, false, 1500);

    let manager = FileLockManager::new();
    let result = manager.try_acquire_path_lock(&path, false, Duration::ZERO);
    assert!(matches!(result, Err(HaspError::Timeout { .. })));

    let status = child.wait().expect("wait for holder");
    assert!(status.success());

    // Same probe now succeeds.
    let mut handle = manager
        .try_acquire_path_lock(&path, false, Duration::ZERO)
        .expect("acquire after release");
    handle.close().unwrap();
    assert!(!sidecar_path(&path).exists());
}

#[test]
fn shared_locks_coexist_across_processes() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("feed.csv");

    let mut child = spawn_holder(&path, true, 1500);

    let manager = FileLockManager::new();
    let mut shared = manager
        .try_acquire_path_lock(&path, false, Duration::ZERO)
        .expect("readers coexist");

    // A writer is excluded while the other process reads.
    let result = manager.try_acquire_path_lock(&path, true, Duration::ZERO);
    assert!(matches!(result, Err(HaspError::Timeout { .. })));

    shared.close().unwrap();
    let status = child.wait().expect("wait for holder");
    assert!(status.success());
}

#[test]
fn run_propagates_lock_timeout_as_exit_code() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("artifact");

    let manager = FileLockManager::new();
    let mut held = manager.acquire_path_lock(&path, true).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_hasp"))
        .arg("run")
        .arg(&path)
        .args(["--timeout-ms", "200", "--", "true"])
        .status()
        .expect("spawn hasp run");
    assert_eq!(status.code(), Some(exit_codes::LOCK_FAILURE));

    held.close().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_hasp"))
        .arg("run")
        .arg(&path)
        .args(["--timeout-ms", "200", "--", "true"])
        .status()
        .expect("spawn hasp run");
    assert_eq!(status.code(), Some(exit_codes::SUCCESS));
}

#[test]
fn status_reports_holder_from_another_process() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("feed.csv");

    let manager = FileLockManager::new();
    let mut held = manager.acquire_path_lock(&path, true).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_hasp"))
        .arg("status")
        .arg(&path)
        .output()
        .expect("spawn hasp status");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout
            .lines()
            .any(|l| l.trim_start().starts_with("Held:") && l.contains("yes")),
        "stdout: {stdout}"
    );

    held.close().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_hasp"))
        .arg("status")
        .arg(&path)
        .output()
        .expect("spawn hasp status");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unlocked (no sidecar)"), "stdout: {stdout}");
}
