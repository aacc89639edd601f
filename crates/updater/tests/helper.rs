#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;
use tempfile::tempdir;
use updater::{run, HelperError};

fn write(path: &Path, data: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, data).unwrap();
}

#[test]
fn live_process_past_grace_window_aborts_untouched() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    let install = dir.path().join("install");
    write(&staging.join("app.bin"), b"new");
    write(&install.join("app.bin"), b"old");

    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let result = run(
        child.id(),
        &staging,
        &install,
        None,
        Duration::from_secs(2),
    );
    child.kill().unwrap();
    child.wait().unwrap();

    assert!(matches!(result, Err(HelperError::Timeout { .. })));
    // Fail-safe: nothing under the install dir moved, staging survives.
    assert_eq!(fs::read(install.join("app.bin")).unwrap(), b"old");
    assert!(staging.join("app.bin").exists());
}

#[test]
fn exited_process_gets_overlaid_and_staging_removed() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    let install = dir.path().join("install");
    write(&staging.join("app.bin"), b"new");
    write(&staging.join("data/added.txt"), b"added");
    write(&install.join("app.bin"), b"old");
    write(&install.join("untouched.txt"), b"keep");

    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    run(pid, &staging, &install, None, Duration::from_secs(5)).unwrap();

    assert_eq!(fs::read(install.join("app.bin")).unwrap(), b"new");
    assert_eq!(fs::read(install.join("data/added.txt")).unwrap(), b"added");
    assert_eq!(fs::read(install.join("untouched.txt")).unwrap(), b"keep");
    assert!(!staging.exists());
}

#[test]
fn missing_restart_target_is_not_fatal() {
    let dir = tempdir().unwrap();
    let staging = dir.path().join("staging");
    let install = dir.path().join("install");
    write(&staging.join("file"), b"x");
    fs::create_dir_all(&install).unwrap();

    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();

    run(
        pid,
        &staging,
        &install,
        Some("does-not-exist"),
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(fs::read(install.join("file")).unwrap(), b"x");
}
