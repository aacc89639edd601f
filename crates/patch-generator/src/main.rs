use anyhow::{bail, Context};
use clap::Parser;
use patch_generator::{Generator, GeneratorConfig, GeneratorOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Produce an incremental patch and refreshed full archive for a new build.
///
/// The working directory carries the fingerprint ledger and signature store
/// and must be the same directory between releases.
#[derive(Parser, Debug)]
#[command(name = "patchgen", version)]
struct Args {
    /// Directory holding the new version of the application
    app_dir: PathBuf,
    /// Directory the patch and full archives are published into;
    /// update.json is expected (and updated) here
    output_dir: PathBuf,
    /// Directory for intermediate state; defaults to the directory of
    /// this executable
    working_dir: Option<PathBuf>,
    /// File inside APP_DIR carrying the new build's version string
    #[arg(long, default_value = "VERSION")]
    version_file: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    if !args.app_dir.is_dir() {
        bail!("app directory does not exist: {}", args.app_dir.display());
    }
    let working_dir = match args.working_dir {
        Some(dir) => dir,
        None => std::env::current_exe()
            .context("could not locate this executable")?
            .parent()
            .context("executable has no parent directory")?
            .to_path_buf(),
    };
    std::fs::create_dir_all(&args.output_dir)?;
    std::fs::create_dir_all(&working_dir)?;

    let mut config = GeneratorConfig::new(args.app_dir, args.output_dir, working_dir);
    config.version_file = args.version_file;

    match Generator::new().generate(&config)? {
        GeneratorOutcome::NoChanges => {
            tracing::warn!("no changes found, nothing published");
        }
        GeneratorOutcome::Published {
            version,
            patch_archive,
            patch_size,
        } => {
            tracing::info!(
                version = %version,
                archive = %patch_archive.display(),
                size = patch_size,
                "patch published"
            );
        }
    }
    Ok(())
}
