//! Lock mode and diagnostic information structures.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Requested or held mode of a path lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Read mode: many concurrent holders.
    Shared,
    /// Write mode: single holder, excludes all others.
    Exclusive,
}

impl LockMode {
    /// True for [`LockMode::Shared`].
    pub fn is_shared(&self) -> bool {
        matches!(self, LockMode::Shared)
    }

    /// Stable lowercase name, used in messages and sidecar metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OS-visible advisory lock record, as it would appear in the OS lock
/// table: whole-file byte range, advisory (never mandatory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsLockRecord {
    /// Whether the record is a write (exclusive) lock.
    pub exclusive: bool,
    /// Always false: POSIX advisory locks do not constrain unlocked access.
    pub mandatory: bool,
    /// Start of the locked byte range.
    pub start: u64,
    /// Length of the locked byte range (whole file).
    pub len: u64,
}

impl OsLockRecord {
    pub(crate) fn shared() -> Self {
        Self {
            exclusive: false,
            mandatory: false,
            start: 0,
            len: u64::MAX,
        }
    }

    pub(crate) fn exclusive() -> Self {
        Self {
            exclusive: true,
            mandatory: false,
            start: 0,
            len: u64::MAX,
        }
    }
}

/// Snapshot of the lock state for one path.
///
/// Purely observational: reflects the registry state at the time of the
/// [`crate::locks::FileLockManager::lock_info`] call.
#[derive(Debug, Clone)]
pub struct FileLockInfo {
    /// The protected path (not the sidecar).
    pub path: PathBuf,

    /// Number of open shared handles.
    pub read_lock_count: u32,

    /// Whether an exclusive handle is open.
    pub write_locked: bool,

    /// OS-visible lock records backing the current holds.
    pub os_locks: Vec<OsLockRecord>,
}

impl std::fmt::Display for FileLockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (readers: {}, writer: {})",
            self.path.display(),
            self.read_lock_count,
            if self.write_locked { "yes" } else { "no" }
        )
    }
}
