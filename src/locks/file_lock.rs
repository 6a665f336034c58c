//! OS-facing read/write lock over one sidecar file.
//!
//! A [`ReadWriteFileLock`] wraps a single open sidecar file and exposes two
//! reentrant halves, [`ReadLock`] and [`WriteLock`], backed by one whole-file
//! OS advisory lock (`flock` via `fs2`). The OS lock is engaged on the 0->1
//! hold transition of a half and released on 1->0; nested `lock()` calls only
//! move the counter.
//!
//! # Reentrancy is not thread-affine
//!
//! Hold counters belong to the lock object, not to the calling thread. A
//! thread other than the one that called `lock()` may legally call the
//! matching `unlock()`. Callers expecting classic per-thread mutex semantics
//! must not rely on them here.
//!
//! # Same-process overlap
//!
//! OS advisory locks do not compose across independent handles within one
//! process. A process-wide table of engaged sidecar paths detects the case
//! where a second `ReadWriteFileLock` instance targets a sidecar some other
//! instance has already engaged, and fails the attempt with an overlap error
//! instead of letting the two handles silently interleave. The same error is
//! raised when one instance's read and write halves are engaged at once,
//! which would otherwise silently convert the underlying flock.

use crate::error::{HaspError, Result, io_err};
use crate::locks::sidecar;
use crate::locks::types::LockMode;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

/// Fallback poll interval for bounded OS acquisition when the caller does not
/// supply one.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Process-wide table of engaged sidecar paths (canonicalized), mapping to the
/// identity of the engaging [`LockInner`].
static ENGAGED_PATHS: OnceLock<Mutex<HashMap<PathBuf, usize>>> = OnceLock::new();

fn engaged_paths() -> MutexGuard<'static, HashMap<PathBuf, usize>> {
    ENGAGED_PATHS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Reentrant read/write lock bound to one sidecar file.
///
/// Construction opens (and, when writable, creates) the sidecar but acquires
/// nothing. Cloning yields another reference to the same underlying lock
/// object; hold counters are shared.
#[derive(Debug, Clone)]
pub struct ReadWriteFileLock {
    inner: Arc<LockInner>,
}

#[derive(Debug)]
struct LockInner {
    /// Sidecar path as given at open time.
    path: PathBuf,
    /// Canonicalized sidecar path, the key in the overlap table.
    key: PathBuf,
    /// Whether the sidecar was opened writable (metadata can be written).
    writable: bool,
    state: Mutex<LockState>,
}

#[derive(Debug)]
struct LockState {
    file: File,
    read_holds: u32,
    write_holds: u32,
}

/// The shared (read) half of a [`ReadWriteFileLock`].
#[derive(Debug, Clone)]
pub struct ReadLock {
    inner: Arc<LockInner>,
}

/// The exclusive (write) half of a [`ReadWriteFileLock`].
#[derive(Debug, Clone)]
pub struct WriteLock {
    inner: Arc<LockInner>,
}

impl ReadWriteFileLock {
    /// Open the sidecar at `path`, creating it when `prefer_write` is set.
    ///
    /// Acquires nothing. A read-only open (`prefer_write == false`) requires
    /// the sidecar to already exist and cannot write diagnostic metadata.
    pub fn open(path: &Path, prefer_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(prefer_write)
            .create(prefer_write)
            .truncate(false)
            .open(path)
            .map_err(|e| io_err(path, e))?;

        // The file exists now, so canonicalization only fails on real I/O
        // trouble (e.g. a parent directory vanishing underneath us).
        let key = path.canonicalize().map_err(|e| io_err(path, e))?;

        Ok(Self {
            inner: Arc::new(LockInner {
                path: path.to_path_buf(),
                key,
                writable: prefer_write,
                state: Mutex::new(LockState {
                    file,
                    read_holds: 0,
                    write_holds: 0,
                }),
            }),
        })
    }

    /// The read half. Independent handles share the same hold counter.
    pub fn read_lock(&self) -> ReadLock {
        ReadLock {
            inner: Arc::clone(&self.inner),
        }
    }

    /// The write half. Independent handles share the same hold counter.
    pub fn write_lock(&self) -> WriteLock {
        WriteLock {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Path of the sidecar file this lock coordinates on.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Engage `mode`, blocking (`deadline == None`) or polling `try_lock`
    /// until `deadline`. Returns `Ok(false)` when the deadline passed without
    /// the OS lock being granted.
    pub(crate) fn engage(
        &self,
        mode: LockMode,
        deadline: Option<Instant>,
        poll: Duration,
    ) -> Result<bool> {
        self.inner.engage(mode, deadline, poll)
    }

    /// Release one hold of `mode`, releasing the OS lock on the 1->0
    /// transition. Over-release is an unlock-misuse fault.
    pub(crate) fn release(&self, mode: LockMode) -> Result<()> {
        self.inner.release(mode)
    }

    /// Convert a sole shared hold into an exclusive hold.
    ///
    /// Blocks (or polls until `deadline`) while other processes hold the
    /// shared lock. On timeout the shared hold is conservatively restored and
    /// `Ok(false)` is returned.
    pub(crate) fn upgrade(&self, deadline: Option<Instant>, poll: Duration) -> Result<bool> {
        self.inner.upgrade(deadline, poll)
    }

    /// Convert a sole exclusive hold into a shared hold.
    pub(crate) fn downgrade(&self) -> Result<()> {
        self.inner.downgrade()
    }
}

impl ReadLock {
    /// Blocking acquire. Reentrant: nested calls increment the hold counter
    /// without touching the OS lock.
    pub fn lock(&self) -> Result<()> {
        self.inner
            .engage(LockMode::Shared, None, DEFAULT_POLL_INTERVAL)
            .map(|_| ())
    }

    /// Non-blocking acquire; `Ok(false)` when another process holds a
    /// conflicting lock.
    pub fn try_lock(&self) -> Result<bool> {
        self.inner
            .engage(LockMode::Shared, Some(Instant::now()), DEFAULT_POLL_INTERVAL)
    }

    /// Release one hold. Any thread may release a hold taken by another
    /// thread; counters are object-level, not thread-level.
    pub fn unlock(&self) -> Result<()> {
        self.inner.release(LockMode::Shared)
    }
}

impl WriteLock {
    /// Blocking acquire. Reentrant: nested calls increment the hold counter
    /// without touching the OS lock.
    pub fn lock(&self) -> Result<()> {
        self.inner
            .engage(LockMode::Exclusive, None, DEFAULT_POLL_INTERVAL)
            .map(|_| ())
    }

    /// Non-blocking acquire; `Ok(false)` when another process holds a
    /// conflicting lock.
    pub fn try_lock(&self) -> Result<bool> {
        self.inner.engage(
            LockMode::Exclusive,
            Some(Instant::now()),
            DEFAULT_POLL_INTERVAL,
        )
    }

    /// Release one hold. Any thread may release a hold taken by another
    /// thread; counters are object-level, not thread-level.
    pub fn unlock(&self) -> Result<()> {
        self.inner.release(LockMode::Exclusive)
    }
}

impl LockInner {
    fn id(&self) -> usize {
        self as *const LockInner as usize
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve this sidecar in the process-wide overlap table.
    fn claim_os_slot(&self) -> Result<()> {
        let mut table = engaged_paths();
        match table.get(&self.key).copied() {
            Some(owner) if owner != self.id() => Err(HaspError::Overlap {
                path: self.path.clone(),
            }),
            _ => {
                table.insert(self.key.clone(), self.id());
                Ok(())
            }
        }
    }

    fn release_os_slot(&self) {
        let mut table = engaged_paths();
        if table.get(&self.key).copied() == Some(self.id()) {
            table.remove(&self.key);
        }
    }

    fn engage(&self, mode: LockMode, deadline: Option<Instant>, poll: Duration) -> Result<bool> {
        let mut st = self.state();

        match mode {
            LockMode::Shared => {
                if st.read_holds > 0 {
                    st.read_holds += 1;
                    return Ok(true);
                }
                if st.write_holds > 0 {
                    return Err(HaspError::Overlap {
                        path: self.path.clone(),
                    });
                }
            }
            LockMode::Exclusive => {
                if st.write_holds > 0 {
                    st.write_holds += 1;
                    return Ok(true);
                }
                if st.read_holds > 0 {
                    return Err(HaspError::Overlap {
                        path: self.path.clone(),
                    });
                }
            }
        }

        self.claim_os_slot()?;
        match self.engage_os(&st.file, mode, deadline, poll) {
            Ok(true) => {}
            Ok(false) => {
                self.release_os_slot();
                return Ok(false);
            }
            Err(e) => {
                self.release_os_slot();
                return Err(e);
            }
        }

        self.record_metadata(&st.file, mode);
        match mode {
            LockMode::Shared => st.read_holds = 1,
            LockMode::Exclusive => st.write_holds = 1,
        }
        tracing::debug!(
            sidecar = %self.path.display(),
            mode = %mode,
            "engaged OS advisory lock"
        );
        Ok(true)
    }

    /// Perform the OS-level lock call for `mode`: one blocking call, or a
    /// `try_lock` poll loop against `deadline` (first probe always happens,
    /// so a past deadline acts as a single non-blocking attempt).
    fn engage_os(
        &self,
        file: &File,
        mode: LockMode,
        deadline: Option<Instant>,
        poll: Duration,
    ) -> Result<bool> {
        let Some(deadline) = deadline else {
            let r = match mode {
                LockMode::Shared => FileExt::lock_shared(file),
                LockMode::Exclusive => FileExt::lock_exclusive(file),
            };
            return r.map(|_| true).map_err(|e| io_err(&self.path, e));
        };

        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(file),
            };
            match attempt {
                Ok(()) => return Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(false);
                    }
                    std::thread::sleep(poll.min(deadline - now));
                }
                Err(e) => return Err(io_err(&self.path, e)),
            }
        }
    }

    fn release(&self, mode: LockMode) -> Result<()> {
        let mut st = self.state();

        let holds = match mode {
            LockMode::Shared => st.read_holds,
            LockMode::Exclusive => st.write_holds,
        };
        match holds {
            0 => Err(HaspError::UnlockMisuse {
                path: self.path.clone(),
            }),
            1 => {
                FileExt::unlock(&st.file).map_err(|e| io_err(&self.path, e))?;
                self.release_os_slot();
                match mode {
                    LockMode::Shared => st.read_holds = 0,
                    LockMode::Exclusive => st.write_holds = 0,
                }
                tracing::debug!(
                    sidecar = %self.path.display(),
                    mode = %mode,
                    "released OS advisory lock"
                );
                Ok(())
            }
            _ => {
                match mode {
                    LockMode::Shared => st.read_holds -= 1,
                    LockMode::Exclusive => st.write_holds -= 1,
                }
                Ok(())
            }
        }
    }

    fn upgrade(&self, deadline: Option<Instant>, poll: Duration) -> Result<bool> {
        let mut st = self.state();
        if st.read_holds != 1 || st.write_holds != 0 {
            return Err(HaspError::InvalidHandle {
                path: self.path.clone(),
                reason: "upgrade requires a sole shared hold".to_string(),
            });
        }

        match deadline {
            None => FileExt::lock_exclusive(&st.file).map_err(|e| io_err(&self.path, e))?,
            Some(deadline) => loop {
                match FileExt::try_lock_exclusive(&st.file) {
                    Ok(()) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        let now = Instant::now();
                        if now >= deadline {
                            // The flock conversion attempt may have dropped
                            // the shared lock; re-engage it before reporting
                            // the timeout so the caller's hold stays intact.
                            FileExt::lock_shared(&st.file).map_err(|e| io_err(&self.path, e))?;
                            return Ok(false);
                        }
                        std::thread::sleep(poll.min(deadline - now));
                    }
                    Err(e) => {
                        FileExt::lock_shared(&st.file).map_err(|e2| {
                            io_err(&self.path, std::io::Error::new(e2.kind(), format!("{e}; {e2}")))
                        })?;
                        return Err(io_err(&self.path, e));
                    }
                }
            },
        }

        st.read_holds = 0;
        st.write_holds = 1;
        self.record_metadata(&st.file, LockMode::Exclusive);
        tracing::debug!(sidecar = %self.path.display(), "upgraded shared lock to exclusive");
        Ok(true)
    }

    fn downgrade(&self) -> Result<()> {
        let mut st = self.state();
        if st.write_holds != 1 || st.read_holds != 0 {
            return Err(HaspError::InvalidHandle {
                path: self.path.clone(),
                reason: "downgrade requires a sole exclusive hold".to_string(),
            });
        }

        // Shared is strictly weaker than the exclusive lock we hold, so the
        // conversion is granted without a release window.
        FileExt::lock_shared(&st.file).map_err(|e| io_err(&self.path, e))?;
        st.write_holds = 0;
        st.read_holds = 1;
        self.record_metadata(&st.file, LockMode::Shared);
        tracing::debug!(sidecar = %self.path.display(), "downgraded exclusive lock to shared");
        Ok(())
    }

    fn record_metadata(&self, file: &File, mode: LockMode) {
        if !self.writable {
            return;
        }
        if let Err(e) = sidecar::write_metadata(file, mode) {
            tracing::debug!(
                sidecar = %self.path.display(),
                error = %e,
                "failed to write sidecar metadata"
            );
        }
    }
}

impl Drop for LockInner {
    fn drop(&mut self) {
        let id = self as *const LockInner as usize;
        let st = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if st.read_holds > 0 || st.write_holds > 0 {
            let _ = FileExt::unlock(&st.file);
            let mut table = engaged_paths();
            if table.get(&self.key).copied() == Some(id) {
                table.remove(&self.key);
            }
        }
    }
}
