//! hasp: cross-process filesystem path locking.
//!
//! Coordinates shared (read) and exclusive (write) access to on-disk
//! resources across threads and OS processes, for pipelines that download or
//! import files concurrently. Coordination happens on a sidecar `P.lock`
//! next to each protected path `P`, held via OS advisory locks, so `P`
//! itself can be created, atomically replaced, or deleted while locked.
//!
//! The [`locks`] module is the core; the `hasp` binary wraps it in a small
//! `flock(1)`-style CLI.
//!
//! # Example
//!
//! ```ignore
//! use hasp::locks::FileLockManager;
//!
//! let manager = FileLockManager::new();
//! let mut handle = manager.acquire_path_lock("staging/feed.csv", true)?;
//! // ... write staging/feed.csv ...
//! let mut shared = handle.to_shared()?; // writers excluded, readers welcome
//! // ... read it back ...
//! shared.close()?;
//! ```

pub mod config;
pub mod error;
pub mod exit_codes;
pub mod locks;

pub use error::{HaspError, Result};
pub use locks::{FileLockInfo, FileLockManager, LockMode, LockedPath};
