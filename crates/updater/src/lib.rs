//! Swap-helper protocol.
//!
//! The update manager cannot overwrite the running application's own files,
//! so it spawns this helper and exits. The helper waits for the calling
//! process to disappear (bounded by a grace window), overlays the staged
//! tree onto the installation, optionally restarts the application, and
//! removes the staging directory. If the caller is still alive when the
//! grace window closes the helper aborts without touching a single file.

use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

/// How long the helper waits for the calling process to exit.
pub const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(10);
/// Interval between liveness polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Convenient result alias for helper operations.
pub type Result<T> = std::result::Result<T, HelperError>;

/// Errors the helper can abort with.
#[derive(thiserror::Error, Debug)]
pub enum HelperError {
    /// The calling process outlived the grace window; no file was touched.
    #[error("process {pid} did not terminate within the grace window")]
    Timeout {
        /// Pid that was expected to exit.
        pid: u32,
    },
    /// The overlay copy or staging cleanup failed. Not rolled back: a
    /// failure mid-copy can leave a mixed old/new tree.
    #[error(transparent)]
    Core(#[from] update_core::CoreError),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// True while a process with the given pid exists.
pub fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes();
    system.process(Pid::from_u32(pid)).is_some()
}

/// Poll `pid` until it exits or `grace` elapses. Returns true when the
/// process is gone.
pub fn wait_for_exit(pid: u32, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    loop {
        if !process_alive(pid) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Execute the full hand-off protocol. State-free: everything the helper
/// needs arrives as arguments.
pub fn run(
    pid: u32,
    staging_dir: &Path,
    install_dir: &Path,
    restart_name: Option<&str>,
    grace: Duration,
) -> Result<()> {
    tracing::info!(pid, "waiting for app termination");
    if !wait_for_exit(pid, grace) {
        // Fail-safe: overwriting a running executable's open files is the
        // one thing this process must never do.
        tracing::error!(pid, "app did not terminate, aborting without touching files");
        return Err(HelperError::Timeout { pid });
    }

    tracing::info!(
        staging = %staging_dir.display(),
        install = %install_dir.display(),
        "app terminated, applying update"
    );
    update_core::fsutil::copy_tree(staging_dir, install_dir)?;
    tracing::info!("update finished");

    if let Some(name) = restart_name {
        let target = install_dir.join(name);
        if target.exists() {
            tracing::info!(app = name, "restarting app");
            Command::new(&target).current_dir(install_dir).spawn()?;
        } else {
            tracing::warn!(app = name, "restart target not found, skipping");
        }
    }

    tracing::info!("cleaning staging directory");
    std::fs::remove_dir_all(staging_dir)?;
    Ok(())
}
