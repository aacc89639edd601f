/// Convenient result alias for manager operations.
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Errors that can occur while resolving, downloading or installing an
/// update. At the public surface they all fold into the coarse
/// [`UpdateState::Error`](crate::UpdateState::Error); the variants exist
/// for logging and for the transport/codec seams.
#[derive(thiserror::Error, Debug)]
pub enum ManagerError {
    /// Network request against the update root failed.
    #[error("update fetch failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Manifest decoding, archive handling or delta application failed.
    #[error(transparent)]
    Core(#[from] update_core::CoreError),
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// The update root URL could not be combined with an artifact name.
    #[error("invalid update url: {0}")]
    InvalidUrl(String),
    /// The running platform has no corresponding helper binary.
    #[error("no updater helper exists for this platform")]
    UnsupportedPlatform,
    /// A download was started without a resolved update plan.
    #[error("no update plan resolved; call check() first")]
    MissingPlan,
}
