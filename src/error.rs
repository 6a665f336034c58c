//! Error types for hasp.
//!
//! Uses thiserror for derive macros and provides user-actionable error messages.
//! Each variant maps to a process exit code in [`crate::exit_codes`].

use crate::exit_codes;
use crate::locks::LockMode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main error type for hasp operations.
#[derive(Error, Debug)]
pub enum HaspError {
    /// User provided invalid arguments or the system is in an invalid state.
    #[error("{0}")]
    UserError(String),

    /// A sidecar file could not be created, opened, or deleted, or an OS lock
    /// call failed for a non-contention reason.
    #[error("i/o failure on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bounded acquisition was not granted within the requested duration.
    #[error("timed out after {waited:?} waiting for {mode} lock on '{}'", .path.display())]
    Timeout {
        path: PathBuf,
        mode: LockMode,
        waited: Duration,
    },

    /// `unlock()` was called without a matching outstanding hold.
    #[error("unlock without matching lock on '{}'", .path.display())]
    UnlockMisuse { path: PathBuf },

    /// An independent handle in this process attempted to lock a sidecar
    /// already engaged by another handle in the same process.
    #[error("overlapping lock on '{}': already engaged by another handle in this process", .path.display())]
    Overlap { path: PathBuf },

    /// Operation on an invalidated or wrong-mode lock handle.
    #[error("invalid lock handle for '{}': {reason}", .path.display())]
    InvalidHandle { path: PathBuf, reason: String },
}

impl HaspError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            HaspError::UserError(_) => exit_codes::USER_ERROR,
            HaspError::UnlockMisuse { .. } => exit_codes::USER_ERROR,
            HaspError::InvalidHandle { .. } => exit_codes::USER_ERROR,
            HaspError::Io { .. } => exit_codes::IO_FAILURE,
            HaspError::Timeout { .. } => exit_codes::LOCK_FAILURE,
            HaspError::Overlap { .. } => exit_codes::LOCK_FAILURE,
        }
    }
}

/// Build an [`HaspError::Io`] for a failed operation on `path`.
pub(crate) fn io_err(path: &Path, source: std::io::Error) -> HaspError {
    HaspError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Result type alias for hasp operations.
pub type Result<T> = std::result::Result<T, HaspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_has_correct_exit_code() {
        let err = HaspError::UserError("bad argument".to_string());
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn io_error_has_correct_exit_code() {
        let err = io_err(
            Path::new("/tmp/x.lock"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.exit_code(), exit_codes::IO_FAILURE);
    }

    #[test]
    fn contention_errors_have_lock_failure_exit_code() {
        let err = HaspError::Timeout {
            path: PathBuf::from("/tmp/x"),
            mode: LockMode::Exclusive,
            waited: Duration::from_millis(10),
        };
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);

        let err = HaspError::Overlap {
            path: PathBuf::from("/tmp/x"),
        };
        assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    }

    #[test]
    fn misuse_errors_have_user_error_exit_code() {
        let err = HaspError::UnlockMisuse {
            path: PathBuf::from("/tmp/x"),
        };
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);

        let err = HaspError::InvalidHandle {
            path: PathBuf::from("/tmp/x"),
            reason: "handle has been invalidated".to_string(),
        };
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    }

    #[test]
    fn error_messages_are_descriptive() {
        let err = HaspError::UnlockMisuse {
            path: PathBuf::from("/data/feed.csv"),
        };
        assert!(err.to_string().contains("unlock without matching lock"));
        assert!(err.to_string().contains("feed.csv"));

        let err = HaspError::Overlap {
            path: PathBuf::from("/data/feed.csv"),
        };
        assert!(err.to_string().contains("another handle in this process"));
    }
}
