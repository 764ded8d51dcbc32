/*!
 * Error types for the toolkit
 */

use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy. Each variant is a *kind*, not a wrapper around
/// an internal type name, so callers can match on it without reaching into
/// implementation details.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A path the caller named does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// Traversal root invalid, or aggregated per-entry traversal failures.
    #[error("walk error: {0}")]
    Walk(String),

    /// Unsupported algorithm, I/O mid-hash, or similar hashing failure.
    #[error("hash error on {path}: {message}")]
    Hash { path: PathBuf, message: String },

    /// Destination unresolvable, overwrite refused, I/O failure during copy/move.
    #[error("copy error: {0}")]
    Copy(String),

    /// Invalid watch root, subscription failure, or queue overflow.
    #[error("watch error: {0}")]
    Watch(String),

    /// Cooperative cancellation was honored.
    #[error("operation cancelled")]
    Cancelled,

    /// Underlying I/O failure not otherwise classified above.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Error::NotFound(path.into())
    }

    pub fn walk(message: impl Into<String>) -> Self {
        Error::Walk(message.into())
    }

    pub fn hash(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Hash {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn copy(message: impl Into<String>) -> Self {
        Error::Copy(message.into())
    }

    pub fn watch(message: impl Into<String>) -> Self {
        Error::Watch(message.into())
    }
}
