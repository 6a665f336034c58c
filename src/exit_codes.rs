//! Exit code constants for the hasp CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, handle misuse)
//! - 2: I/O failure (sidecar file or OS lock call failed)
//! - 3: Lock contention (timeout or same-process overlap)
//!
//! `hasp run` propagates the child command's own exit code instead when the
//! lock was acquired and the child ran.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid state, or lock-handle misuse.
pub const USER_ERROR: i32 = 1;

/// I/O failure: sidecar file could not be created/deleted, or an OS lock call
/// failed for a non-contention reason.
pub const IO_FAILURE: i32 = 2;

/// Lock contention: a bounded acquisition timed out, or an overlapping
/// same-process handle already held the lock.
pub const LOCK_FAILURE: i32 = 3;
