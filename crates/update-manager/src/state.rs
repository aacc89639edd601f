use update_core::Version;

/// The manager's finite-state-machine value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Initial state; also the result of a check that found nothing to do.
    NoUpdateAvailable,
    /// A check resolved a plan; a download may be started.
    UpdateAvailable,
    /// A background download is running.
    DownloadInProgress,
    /// The staging directory holds the reconciled new tree.
    UpdateReady,
    /// The helper process was spawned; the application should exit soon.
    UpdaterStarted,
    /// The last operation failed; retry by calling `check()` again.
    Error,
    /// No helper binary exists for this platform. Sticky and terminal.
    UnknownPlatform,
}

/// Resolved update plan. Ephemeral: recomputed on every check, superseded
/// by the next one, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Version the installation is currently at.
    pub current_version: Version,
    /// Total bytes the download will transfer (patches or full archive,
    /// plus the helper binary when it is outdated).
    pub total_size: u64,
    /// Patches newer than the current version, ascending, with their
    /// release descriptions. Informational when the plan resolves to a
    /// full-archive reinstall.
    pub patches: Vec<(Version, String)>,
}

impl UpdatePlan {
    /// Newest version this plan brings the installation to, if any patch
    /// is part of it.
    pub fn latest_version(&self) -> Option<Version> {
        self.patches.last().map(|(v, _)| *v)
    }
}
