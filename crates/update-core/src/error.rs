use std::path::PathBuf;

/// Convenient result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors shared by the generator, manager and helper layers.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Failed to perform an I/O operation.
    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),
    /// A manifest or ledger could not be decoded from JSON.
    #[error("json decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    /// A version string did not have the `a.b.c.d` shape.
    #[error("invalid version string: {0:?}")]
    InvalidVersion(String),
    /// Appending to the patch trail would break its ascending order.
    #[error("patch version {candidate} does not exceed latest published {latest}")]
    NonAscendingPatch {
        /// Version being appended.
        candidate: String,
        /// Newest version already in the trail.
        latest: String,
    },
    /// An archive could not be read or written.
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// An archive entry resolved outside its extraction root.
    #[error("archive entry escapes extraction root: {0}")]
    UnsafeArchivePath(String),
    /// The delta codec failed to build or apply an artifact.
    #[error("delta codec error on {path}: {reason}")]
    Delta {
        /// File the codec was working on.
        path: PathBuf,
        /// Codec-reported failure.
        reason: String,
    },
}

impl CoreError {
    /// Helper for wrapping codec failures.
    pub fn delta(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        CoreError::Delta {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
