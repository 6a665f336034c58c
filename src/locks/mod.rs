//! Locking subsystem for hasp.
//!
//! This module implements cross-process path locking for pipelines that stage
//! files on disk:
//! - [`ReadWriteFileLock`]: the OS-facing primitive, one whole-file advisory
//!   lock per sidecar with reentrant read/write halves
//! - [`FileLockManager`]: the per-path registry and sole acquisition entry
//!   point
//! - [`LockedPath`]: the scoped handle over one granted lock, supporting
//!   shared<->exclusive transitions and ownership transfer
//! - [`FileLockInfo`]: observational per-path snapshots
//!
//! # Sidecar lock files
//!
//! A protected path `P` is coordinated through a sidecar `P.lock` created on
//! first acquisition and deleted when the manager's last handle for `P`
//! closes. `P` itself is never opened for locking, so it can be created,
//! atomically replaced, or deleted while coordination continues.
//!
//! # Reentrancy
//!
//! Hold counters are object-level, **not** thread-affine: a different thread
//! than the one that called `lock()` may call the matching `unlock()`, and
//! handles move freely across threads. Code ported from per-thread mutex
//! idioms must not assume ownership checks that do not exist here.
//!
//! # Cross-process vs. same-process
//!
//! Contention between processes is arbitrated by the OS advisory lock:
//! readers coexist, a writer excludes everyone. Within one process,
//! coordination goes through a manager's registry; independent lock handles
//! on the same sidecar do not compose and fail with an overlap fault instead
//! of blocking.

mod file_lock;
mod guard;
mod manager;
mod sidecar;
mod types;


// Re-export public API
pub use file_lock::{ReadLock, ReadWriteFileLock, WriteLock};
pub use guard::LockedPath;
pub use manager::FileLockManager;
pub use sidecar::{SidecarMetadata, sidecar_path};
pub use types::{FileLockInfo, LockMode, OsLockRecord};
