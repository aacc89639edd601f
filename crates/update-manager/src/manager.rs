use crate::cmdline::QuoteStyle;
use crate::error::{ManagerError, Result};
use crate::events::{EventReceiver, EventSender, ProgressTracker, UpdateEvent};
use crate::platform::Platform;
use crate::source::UpdateSource;
use crate::state::{UpdatePlan, UpdateState};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex as StdMutex};
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, Mutex};
use update_core::{
    archive, fsutil, patch_archive_name, DeltaCodec, RsyncCodec, UpdateInfo, Version, DELTA_SUFFIX,
    MANIFEST_FILE,
};

/// Sidecar file recording the version of the cached helper binary.
const UPDATER_VERSION_FILE: &str = "updater.version";

/// Configuration for an [`UpdateManager`].
pub struct UpdateConfig {
    /// Root of the live installation the update applies to.
    pub install_dir: PathBuf,
    /// Scratch root for staging directories and the cached helper binary.
    /// Defaults to `install_dir/update`.
    pub update_dir: Option<PathBuf>,
    /// Version the installation is currently at.
    pub current_version: Version,
    /// Target platform; detected from the running process by default.
    pub platform: Platform,
}

impl UpdateConfig {
    pub fn new(install_dir: impl Into<PathBuf>, current_version: Version) -> Self {
        UpdateConfig {
            install_dir: install_dir.into(),
            update_dir: None,
            current_version,
            platform: Platform::current(),
        }
    }
}

struct Snapshot {
    state: UpdateState,
    plan: Option<UpdatePlan>,
}

/// Session state owned by whichever operation currently holds the lock.
struct Session {
    info: Option<UpdateInfo>,
}

struct Inner<S> {
    source: S,
    codec: Box<dyn DeltaCodec>,
    current_version: Version,
    platform: Platform,
    install_dir: PathBuf,
    update_dir: PathBuf,
    download_dir: PathBuf,
    patch_dir: PathBuf,
    updater_path: Option<PathBuf>,
    snapshot: StdMutex<Snapshot>,
    session: Mutex<Session>,
    events: EventSender,
}

/// Client-side update state machine.
///
/// One logical update session owns all state transitions: `check`,
/// `install` and the whole background download serialize on a single
/// session lock. A `check()` or `install()` call issued while a download
/// is in flight therefore blocks until the download finishes; only
/// [`state()`](UpdateManager::state) and [`plan()`](UpdateManager::plan)
/// read a snapshot without blocking.
pub struct UpdateManager<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for UpdateManager<S> {
    fn clone(&self) -> Self {
        UpdateManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> UpdateManager<S>
where
    S: UpdateSource + 'static,
{
    /// Create a manager with the default delta codec. Returns the manager
    /// and the receiving half of its progress/completion channel.
    pub fn new(source: S, config: UpdateConfig) -> (Self, EventReceiver) {
        Self::with_codec(source, config, Box::new(RsyncCodec::default()))
    }

    /// Create a manager with a custom delta codec.
    pub fn with_codec(
        source: S,
        config: UpdateConfig,
        codec: Box<dyn DeltaCodec>,
    ) -> (Self, EventReceiver) {
        let update_dir = config
            .update_dir
            .unwrap_or_else(|| config.install_dir.join("update"));
        let updater_path = config
            .platform
            .updater_file_name()
            .map(|name| update_dir.join(name));
        let state = if updater_path.is_none() {
            UpdateState::UnknownPlatform
        } else {
            UpdateState::NoUpdateAvailable
        };
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = UpdateManager {
            inner: Arc::new(Inner {
                source,
                codec,
                current_version: config.current_version,
                platform: config.platform,
                install_dir: config.install_dir,
                download_dir: update_dir.join("download"),
                patch_dir: update_dir.join("patch"),
                update_dir,
                updater_path,
                snapshot: StdMutex::new(Snapshot { state, plan: None }),
                session: Mutex::new(Session { info: None }),
                events,
            }),
        };
        (manager, receiver)
    }

    /// Current state, readable at any time without blocking on an
    /// in-flight operation.
    pub fn state(&self) -> UpdateState {
        self.lock_snapshot().state
    }

    /// The plan resolved by the last successful `check()`, if any.
    pub fn plan(&self) -> Option<UpdatePlan> {
        self.lock_snapshot().plan.clone()
    }

    /// Directory the reconciled new tree is staged in. Left on disk after
    /// a failed download for diagnosis.
    pub fn staging_dir(&self) -> &Path {
        &self.inner.patch_dir
    }

    /// Fetch the manifest and resolve what this installation needs.
    ///
    /// Transitions to `UpdateAvailable`, `NoUpdateAvailable` or `Error`.
    pub async fn check(&self) -> UpdateState {
        let mut session = self.inner.session.lock().await;
        tracing::debug!("check()");
        if self.state() == UpdateState::UnknownPlatform {
            return UpdateState::UnknownPlatform;
        }
        match self.resolve(&mut session).await {
            Ok(state) => state,
            Err(err) => {
                tracing::error!(error = %err, "could not check for update");
                self.store_plan(None);
                self.set_state(UpdateState::Error)
            }
        }
    }

    async fn resolve(&self, session: &mut Session) -> Result<UpdateState> {
        let raw = self.inner.source.fetch_string(MANIFEST_FILE).await?;
        let info = UpdateInfo::from_json(&raw)?;
        let current = self.inner.current_version;

        // Walk the trail newest to oldest, collecting everything newer
        // than the installed version.
        let mut patches = Vec::new();
        let mut update_size: u64 = 0;
        for patch in info.patch_trail.iter().rev() {
            if patch.version <= current {
                break;
            }
            tracing::trace!(version = %patch.version, size = patch.size_in_bytes, "require patch");
            patches.push((patch.version, patch.description.clone()));
            update_size += patch.size_in_bytes;
        }
        patches.reverse();

        if full_update_necessary(&info, current, update_size) {
            update_size = info.full_app_archive_size;
            tracing::trace!(update_size, "full app update necessary");
        }
        if update_size == 0 {
            session.info = Some(info);
            self.store_plan(None);
            return Ok(self.set_state(UpdateState::NoUpdateAvailable));
        }
        if self.updater_outdated(&info) {
            update_size += info.updater_size;
            tracing::trace!(update_size, "new updater required");
        }

        let plan = UpdatePlan {
            current_version: current,
            total_size: update_size,
            patches,
        };
        tracing::debug!(current = %plan.current_version, total = plan.total_size, "update available");
        session.info = Some(info);
        self.store_plan(Some(plan));
        Ok(self.set_state(UpdateState::UpdateAvailable))
    }

    /// Start the background download. Legal only from `UpdateAvailable`;
    /// flips to `DownloadInProgress` and returns immediately. Progress and
    /// the terminal state arrive on the event channel.
    pub fn download_async(&self) -> UpdateState {
        tracing::debug!("download_async()");
        {
            // Compare-and-flip under one guard: two concurrent callers must
            // never both observe UpdateAvailable and spawn two workers.
            let mut snapshot = self.lock_snapshot();
            if snapshot.state != UpdateState::UpdateAvailable {
                tracing::error!(state = ?snapshot.state, "download_async() called in wrong state");
                return snapshot.state;
            }
            snapshot.state = UpdateState::DownloadInProgress;
        }
        let worker = self.clone();
        tokio::spawn(async move { worker.run_download().await });
        UpdateState::DownloadInProgress
    }

    async fn run_download(&self) {
        // Holds the session lock for the entire transfer: foreground
        // operations issued meanwhile queue up behind it.
        let mut session = self.inner.session.lock().await;
        let final_state = match self.download_and_prepare(&mut session).await {
            Ok(()) => {
                if self.inner.download_dir.exists() {
                    if let Err(err) = fs::remove_dir_all(&self.inner.download_dir) {
                        tracing::warn!(error = %err, "could not clean download cache");
                    }
                }
                UpdateState::UpdateReady
            }
            Err(err) => {
                // Patch staging stays on disk for diagnosis.
                tracing::error!(error = %err, "could not download update");
                UpdateState::Error
            }
        };
        self.set_state(final_state);
        let _ = self.inner.events.send(UpdateEvent::Finished(final_state));
    }

    async fn download_and_prepare(&self, session: &mut Session) -> Result<()> {
        let info = session.info.clone().ok_or(ManagerError::MissingPlan)?;
        let plan = self.plan().ok_or(ManagerError::MissingPlan)?;

        fsutil::reset_dir(&self.inner.download_dir)?;
        fsutil::reset_dir(&self.inner.patch_dir)?;
        let mut progress = ProgressTracker::new(plan.total_size, self.inner.events.clone());

        // The helper binary must be current before anything else: a failed
        // install with a stale helper is worse than a failed download.
        let mut full_reference = info.full_app_archive_size;
        if self.updater_outdated(&info) {
            let name = self
                .inner
                .platform
                .updater_file_name()
                .ok_or(ManagerError::UnsupportedPlatform)?;
            let updater_path = self
                .inner
                .updater_path
                .as_ref()
                .ok_or(ManagerError::UnsupportedPlatform)?;
            tracing::debug!(name, "download updater");
            if updater_path.exists() {
                fs::remove_file(updater_path)?;
            }
            if let Err(err) = self
                .inner
                .source
                .fetch_file(name, updater_path, &mut |n| progress.add(n))
                .await
            {
                // Never leave a truncated helper binary behind.
                if updater_path.exists() {
                    let _ = fs::remove_file(updater_path);
                }
                return Err(err);
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = fs::metadata(updater_path)?.permissions();
                perms.set_mode(0o755);
                fs::set_permissions(updater_path, perms)?;
            }
            fs::write(
                self.updater_version_sidecar(),
                info.updater_version.to_string(),
            )?;
            full_reference += info.updater_size;
        }

        // Re-evaluate incremental vs full with resolved sizes; the
        // incremental path additionally requires an unbroken chain.
        let patches_smaller_than_full = plan.total_size < full_reference;
        let patches_apply_cleanly = info
            .patch_trail
            .first()
            .map(|p| p.version <= plan.current_version)
            .unwrap_or(false);
        tracing::debug!(patches_smaller_than_full, patches_apply_cleanly, "route decision");

        if patches_smaller_than_full && patches_apply_cleanly {
            for (version, _) in &plan.patches {
                let name = patch_archive_name(version);
                tracing::debug!(name, "download patch");
                let archive_path = self.inner.download_dir.join(&name);
                self.inner
                    .source
                    .fetch_file(&name, &archive_path, &mut |n| progress.add(n))
                    .await?;
                self.prepare_patch_archive(&archive_path)?;
            }
        } else {
            let name = info.full_app_archive_file();
            tracing::debug!(name, "download full app archive");
            let archive_path = self.inner.download_dir.join(&name);
            self.inner
                .source
                .fetch_file(&name, &archive_path, &mut |n| progress.add(n))
                .await?;
            archive::unpack_into(&archive_path, &self.inner.patch_dir)?;
        }
        Ok(())
    }

    /// Reconcile one downloaded patch archive into the staging directory:
    /// delta entries are applied against the installed base file, plain
    /// entries extracted verbatim.
    fn prepare_patch_archive(&self, archive_path: &Path) -> Result<()> {
        archive::visit_entries(archive_path, |rel, data| self.prepare_entry(rel, data))?;
        Ok(())
    }

    fn prepare_entry(&self, rel: &Path, data: Vec<u8>) -> update_core::Result<()> {
        let name = rel.to_string_lossy();
        if let Some(stripped) = name.strip_suffix(DELTA_SUFFIX) {
            tracing::trace!(entry = %name, "apply delta");
            let stripped = PathBuf::from(stripped);
            let base = self.inner.install_dir.join(&stripped);
            let target = self.inner.patch_dir.join(&stripped);
            // The codec works on files; park the delta in the download cache.
            let mut delta = NamedTempFile::new_in(&self.inner.download_dir)?;
            delta.write_all(&data)?;
            delta.flush()?;
            self.inner.codec.apply_delta(&base, delta.path(), &target)?;
        } else {
            tracing::trace!(entry = %name, "extract verbatim");
            let target = self.inner.patch_dir.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, data)?;
        }
        Ok(())
    }

    /// Spawn the helper process that swaps the staged tree into place once
    /// this process exits. Legal only from `UpdateReady`; on success the
    /// caller is expected to terminate within the helper's grace window.
    pub async fn install(&self, restart_name: Option<&str>) -> UpdateState {
        let _session = self.inner.session.lock().await;
        tracing::debug!("install()");
        let state = self.state();
        if state != UpdateState::UpdateReady {
            tracing::error!(?state, "install() called in wrong state");
            return state;
        }
        match self.spawn_helper(restart_name) {
            Ok(()) => self.set_state(UpdateState::UpdaterStarted),
            Err(err) => {
                // Staging is preserved so installation can be retried
                // without re-downloading.
                tracing::error!(error = %err, "could not start updater");
                self.set_state(UpdateState::Error)
            }
        }
    }

    fn spawn_helper(&self, restart_name: Option<&str>) -> Result<()> {
        let updater = self
            .inner
            .updater_path
            .as_ref()
            .ok_or(ManagerError::UnsupportedPlatform)?;

        let mut args = vec![
            std::process::id().to_string(),
            self.inner.patch_dir.to_string_lossy().into_owned(),
            self.inner.install_dir.to_string_lossy().into_owned(),
        ];
        if let Some(name) = restart_name {
            args.push(name.to_string());
        }
        let quoting = QuoteStyle::for_platform(self.inner.platform);
        tracing::debug!(
            updater = %updater.display(),
            command = %quoting.join(&args),
            "starting updater"
        );

        let mut command = Command::new(updater);
        command
            .current_dir(&self.inner.update_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            for arg in &args {
                command.raw_arg(quoting.quote(arg));
            }
        }
        #[cfg(not(windows))]
        {
            command.args(&args);
        }
        command.spawn()?;
        Ok(())
    }

    fn updater_outdated(&self, info: &UpdateInfo) -> bool {
        let Some(path) = self.inner.updater_path.as_ref() else {
            return false;
        };
        if !path.exists() {
            return true;
        }
        let cached: Option<Version> = fs::read_to_string(self.updater_version_sidecar())
            .ok()
            .and_then(|s| s.trim().parse().ok());
        match cached {
            Some(version) => version < info.updater_version,
            None => true,
        }
    }

    fn updater_version_sidecar(&self) -> PathBuf {
        self.inner.update_dir.join(UPDATER_VERSION_FILE)
    }

    fn lock_snapshot(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.inner
            .snapshot
            .lock()
            .expect("snapshot lock poisoned")
    }

    fn set_state(&self, state: UpdateState) -> UpdateState {
        self.lock_snapshot().state = state;
        state
    }

    fn store_plan(&self, plan: Option<UpdatePlan>) {
        self.lock_snapshot().plan = plan;
    }
}

/// Full reinstall is forced when the accumulated patch size already
/// reaches the full archive, or when the installed version predates the
/// earliest patch ever published (no unbroken incremental chain exists).
fn full_update_necessary(info: &UpdateInfo, current: Version, patches_size: u64) -> bool {
    match info.patch_trail.first() {
        Some(oldest) => {
            patches_size >= info.full_app_archive_size || oldest.version > current
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use update_core::Patch;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn info_with_trail(full_size: u64, sizes: &[(&str, u64)]) -> UpdateInfo {
        let mut info = UpdateInfo {
            full_app_archive_size: full_size,
            ..UpdateInfo::default()
        };
        for (version, size) in sizes {
            info.append_patch(Patch::new(v(version), "", *size)).unwrap();
        }
        info
    }

    #[test]
    fn full_update_when_patches_outweigh_archive() {
        let info = info_with_trail(100, &[("1.0.0.0", 60), ("1.0.0.1", 60)]);
        assert!(full_update_necessary(&info, v("0.9.0.0"), 120));
        assert!(!full_update_necessary(&info, v("1.0.0.0"), 60));
    }

    #[test]
    fn full_update_when_chain_is_broken() {
        // Installed version predates the earliest published patch.
        let info = info_with_trail(1000, &[("2.0.0.0", 10), ("2.0.0.1", 10)]);
        assert!(full_update_necessary(&info, v("1.0.0.0"), 20));
    }

    #[test]
    fn empty_trail_never_forces_full_update() {
        let info = info_with_trail(1000, &[]);
        assert!(!full_update_necessary(&info, v("1.0.0.0"), 0));
    }
}
