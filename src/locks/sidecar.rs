//! Sidecar lock file naming and diagnostic metadata.
//!
//! For a protected path `P`, coordination happens on the sidecar `P.lock`.
//! `P` itself is never opened for locking, so it can be created, atomically
//! replaced, or deleted while coordination continues.
//!
//! The current holder writes a small JSON document into the sidecar (owner,
//! pid, mode, timestamp). This is best-effort diagnostics for `hasp status`,
//! `hasp list`, and stale-lock detection in `hasp clean`; it is never
//! consulted for correctness.

use crate::error::{HaspError, Result};
use crate::locks::types::LockMode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Compute the sidecar lock path for a protected path: `foo` -> `foo.lock`,
/// `foo.tar` -> `foo.tar.lock`. Works for directories as well.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Diagnostic metadata stored in sidecar lock files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    /// Holder of the lock (e.g., `user@HOST`).
    pub owner: String,

    /// Process ID of the lock holder.
    pub pid: u32,

    /// Mode held when the metadata was written.
    pub mode: LockMode,

    /// Timestamp when the lock was engaged (RFC3339).
    pub acquired_at: DateTime<Utc>,
}

impl SidecarMetadata {
    /// Create new metadata for the current process with the current timestamp.
    pub fn new(mode: LockMode) -> Self {
        Self {
            owner: owner_string(),
            pid: std::process::id(),
            mode,
            acquired_at: Utc::now(),
        }
    }

    /// Parse sidecar metadata from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            HaspError::UserError(format!(
                "failed to read sidecar '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            HaspError::UserError(format!(
                "failed to parse sidecar '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Calculate the age of the metadata record.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Check if the record is stale based on the given threshold in minutes.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() > stale_minutes as i64
    }
}

/// Overwrite the sidecar's contents with fresh metadata through the already
/// open (and locked) file handle. Callers treat failure as non-fatal.
pub(crate) fn write_metadata(file: &File, mode: LockMode) -> std::io::Result<()> {
    let metadata = SidecarMetadata::new(mode);
    let json = serde_json::to_string_pretty(&metadata).map_err(std::io::Error::other)?;

    file.set_len(0)?;
    let mut handle = file;
    handle.seek(SeekFrom::Start(0))?;
    handle.write_all(json.as_bytes())?;
    handle.flush()
}

/// Get the owner string for sidecar metadata.
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
