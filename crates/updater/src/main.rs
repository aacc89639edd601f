use anyhow::{bail, Context};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Swap a staged update into the installation once the app has exited.
///
/// Spawned by the update manager right before the application terminates.
#[derive(Parser, Debug)]
#[command(name = "updater", version)]
struct Args {
    /// Pid of the calling application process
    pid: u32,
    /// Staging directory holding the reconciled new tree
    staging_dir: PathBuf,
    /// Installation directory to overlay
    install_dir: PathBuf,
    /// Executable name under the installation directory to restart
    restart_name: Option<String>,
}

fn init_logging() {
    // The helper runs headless; log to a file beside the executable and
    // fall back to stderr when that is not writable.
    let log_file = std::env::current_exe()
        .ok()
        .and_then(|exe| Some(exe.parent()?.join("update.log")))
        .and_then(|path| File::create(path).ok());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .with_ansi(false);
    match log_file {
        Some(file) => builder.with_writer(Arc::new(file)).init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    tracing::debug!(?args, "updater invoked");

    if !args.staging_dir.is_dir() {
        bail!(
            "staging directory does not exist: {}",
            args.staging_dir.display()
        );
    }
    if !args.install_dir.is_dir() {
        bail!(
            "install directory does not exist: {}",
            args.install_dir.display()
        );
    }

    updater::run(
        args.pid,
        &args.staging_dir,
        &args.install_dir,
        args.restart_name.as_deref(),
        updater::DEFAULT_GRACE_WINDOW,
    )
    .context("update failed")?;
    Ok(())
}
