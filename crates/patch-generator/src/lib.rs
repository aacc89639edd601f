//! Patch generator.
//!
//! Run once per release, offline: diffs the freshly built application tree
//! against the fingerprint ledger left behind by the previous run, packages
//! the changed files as a patch archive (deltas for modified files,
//! verbatim copies for new ones), rebuilds the full archive, and appends
//! the release to the published manifest. The manifest is written last so
//! a failed run never publishes partially.

use std::fs;
use std::path::{Path, PathBuf};
use update_core::{
    archive, fingerprint_file, fsutil, patch_archive_name, DeltaCodec, Patch, PatchLedger,
    RsyncCodec, UpdateInfo, Version, DELTA_SUFFIX, LEDGER_FILE, MANIFEST_FILE, SIGNATURE_SUFFIX,
};
use walkdir::WalkDir;

/// Sidecar file next to a published updater binary carrying its version.
const UPDATER_VERSION_FILE: &str = "updater.version";
/// Helper binary names the generator looks for in the output directory.
const UPDATER_BINARIES: [&str; 2] = ["updater.exe", "updater"];

/// Convenient result alias for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors that can abort a generator run.
#[derive(thiserror::Error, Debug)]
pub enum GeneratorError {
    /// A core capability (fingerprint, codec, archive, manifest) failed.
    #[error(transparent)]
    Core(#[from] update_core::CoreError),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// The version file was missing from the new application tree.
    #[error("version file not found in app tree: {0}")]
    MissingVersionFile(PathBuf),
    /// The ledger knows a file the signature store has no entry for.
    #[error("signature missing for previously generated file: {0}")]
    MissingSignature(PathBuf),
    /// The new build's version does not exceed the latest published one.
    #[error("build version {build} does not exceed latest published {latest}")]
    StaleBuildVersion {
        /// Version read from the build under diff.
        build: Version,
        /// Newest version already in the manifest trail.
        latest: Version,
    },
}

/// Where a generator run reads from and writes to.
pub struct GeneratorConfig {
    /// Directory holding the new version of the application.
    pub app_dir: PathBuf,
    /// Directory the archives are published into; `update.json` lives here.
    pub output_dir: PathBuf,
    /// Directory for the ledger and signature store. Must be the same
    /// directory between releases.
    pub working_dir: PathBuf,
    /// Path, relative to `app_dir`, of the file carrying the new build's
    /// version string.
    pub version_file: String,
}

impl GeneratorConfig {
    pub fn new(
        app_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        GeneratorConfig {
            app_dir: app_dir.into(),
            output_dir: output_dir.into(),
            working_dir: working_dir.into(),
            version_file: "VERSION".to_string(),
        }
    }
}

/// Result of a generator run.
#[derive(Debug, PartialEq, Eq)]
pub enum GeneratorOutcome {
    /// No file changed fingerprint; nothing was published.
    NoChanges,
    /// A patch was packaged and appended to the manifest.
    Published {
        version: Version,
        patch_archive: PathBuf,
        patch_size: u64,
    },
}

/// Diffs a new application tree against the ledger and publishes a patch.
pub struct Generator {
    codec: Box<dyn DeltaCodec>,
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

impl Generator {
    /// Generator with the default delta codec.
    pub fn new() -> Self {
        Generator {
            codec: Box::new(RsyncCodec::default()),
        }
    }

    /// Generator with a custom delta codec.
    pub fn with_codec(codec: Box<dyn DeltaCodec>) -> Self {
        Generator { codec }
    }

    /// Run one generation pass. See the crate docs for the full protocol.
    pub fn generate(&self, config: &GeneratorConfig) -> Result<GeneratorOutcome> {
        let version = read_build_version(config)?;
        tracing::info!(version = %version, app_dir = %config.app_dir.display(), "generating patch");

        let manifest_path = config.output_dir.join(MANIFEST_FILE);
        let mut manifest = UpdateInfo::load_or_default(&manifest_path)?;
        let latest = manifest.latest_version();
        if version <= latest {
            return Err(GeneratorError::StaleBuildVersion {
                build: version,
                latest,
            });
        }

        let signature_dir = config.working_dir.join("signatures");
        fs::create_dir_all(&signature_dir)?;
        let staging_dir = config.working_dir.join("patch");
        fsutil::reset_dir(&staging_dir)?;

        let ledger_path = config.working_dir.join(LEDGER_FILE);
        let mut ledger = PatchLedger::load_or_default(&ledger_path)?;

        self.diff_tree(config, &signature_dir, &staging_dir, &mut ledger)?;

        if fsutil::dir_is_empty(&staging_dir)? {
            tracing::warn!("no changes found, not generating an empty patch");
            fs::remove_dir_all(&staging_dir)?;
            return Ok(GeneratorOutcome::NoChanges);
        }

        ledger.save(&ledger_path)?;

        // Package the patch.
        let patch_name = patch_archive_name(&version);
        let patch_archive = config.output_dir.join(&patch_name);
        tracing::info!(archive = %patch_name, "packaging patch");
        archive::pack_dir(&staging_dir, &patch_archive)?;
        let patch_size = fs::metadata(&patch_archive)?.len();
        manifest
            .append_patch(Patch::new(version, "", patch_size))
            .expect("ascending order verified above");

        // Rebuild the canonical full archive from the entire new tree.
        let full_archive = config.output_dir.join(manifest.full_app_archive_file());
        tracing::info!(archive = %full_archive.display(), "packaging full app archive");
        if full_archive.exists() {
            fs::remove_file(&full_archive)?;
        }
        archive::pack_dir(&config.app_dir, &full_archive)?;
        manifest.full_app_archive_size = fs::metadata(&full_archive)?.len();

        record_published_updater(config, &mut manifest);

        // The manifest is persisted last: a failure anywhere above leaves
        // the published catalog untouched.
        tracing::info!(manifest = %manifest_path.display(), "updating manifest");
        manifest.save(&manifest_path)?;

        fs::remove_dir_all(&staging_dir)?;
        Ok(GeneratorOutcome::Published {
            version,
            patch_archive,
            patch_size,
        })
    }

    fn diff_tree(
        &self,
        config: &GeneratorConfig,
        signature_dir: &Path,
        staging_dir: &Path,
        ledger: &mut PatchLedger,
    ) -> Result<()> {
        for entry in WalkDir::new(&config.app_dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(&config.app_dir)
                .expect("walkdir yields children of app_dir");
            let rel_key = rel.to_string_lossy().replace('\\', "/");

            let new_hash = fingerprint_file(path)?;
            let signature_path =
                signature_dir.join(format!("{rel_key}{SIGNATURE_SUFFIX}"));

            match ledger.fingerprint(&rel_key) {
                Some(old_hash) if old_hash == new_hash => {
                    tracing::trace!(file = %rel_key, "unchanged");
                }
                Some(_) => {
                    tracing::debug!(file = %rel_key, "modified, calculating delta");
                    if !signature_path.exists() {
                        return Err(GeneratorError::MissingSignature(signature_path));
                    }
                    let delta_path = staging_dir.join(format!("{rel_key}{DELTA_SUFFIX}"));
                    self.codec.build_delta(path, &signature_path, &delta_path)?;
                    // Regenerate the signature against the new content for
                    // the next generation.
                    fs::remove_file(&signature_path)?;
                    self.codec.build_signature(path, &signature_path)?;
                    ledger.record(rel_key, new_hash);
                }
                None => {
                    tracing::debug!(file = %rel_key, "new file, copying verbatim");
                    let staged = staging_dir.join(rel);
                    if let Some(parent) = staged.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::copy(path, &staged)?;
                    self.codec.build_signature(path, &signature_path)?;
                    ledger.record(rel_key, new_hash);
                }
            }
        }
        Ok(())
    }
}

fn read_build_version(config: &GeneratorConfig) -> Result<Version> {
    let path = config.app_dir.join(&config.version_file);
    if !path.exists() {
        return Err(GeneratorError::MissingVersionFile(path));
    }
    Ok(fs::read_to_string(&path)?.trim().parse()?)
}

/// If a platform updater binary sits in the output directory alongside its
/// version sidecar, advertise it in the manifest.
fn record_published_updater(config: &GeneratorConfig, manifest: &mut UpdateInfo) {
    for name in UPDATER_BINARIES {
        let path = config.output_dir.join(name);
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        let sidecar = config.output_dir.join(UPDATER_VERSION_FILE);
        let version: Option<Version> = fs::read_to_string(&sidecar)
            .ok()
            .and_then(|s| s.trim().parse().ok());
        match version {
            Some(version) => {
                tracing::debug!(binary = name, version = %version, "recording updater");
                manifest.updater_version = version;
                manifest.updater_size = meta.len();
            }
            None => {
                tracing::warn!(
                    binary = name,
                    sidecar = %sidecar.display(),
                    "updater binary present but version sidecar missing or invalid"
                );
            }
        }
    }
}
