//! Per-path lock registry and acquisition entry point.

use crate::error::{HaspError, Result, io_err};
use crate::locks::file_lock::{DEFAULT_POLL_INTERVAL, ReadWriteFileLock};
use crate::locks::guard::LockedPath;
use crate::locks::sidecar::sidecar_path;
use crate::locks::types::{FileLockInfo, LockMode, OsLockRecord};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Registry entry for one path with at least one open handle.
#[derive(Debug)]
pub(crate) struct PathState {
    pub(crate) lock: ReadWriteFileLock,
    pub(crate) read_handles: u32,
    pub(crate) write_handle: bool,
}

impl PathState {
    fn new(lock: ReadWriteFileLock) -> Self {
        Self {
            lock,
            read_handles: 0,
            write_handle: false,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.read_handles == 0 && !self.write_handle
    }

    fn info(&self, path: &Path) -> FileLockInfo {
        let os_locks = if self.write_handle {
            vec![OsLockRecord::exclusive()]
        } else if self.read_handles > 0 {
            vec![OsLockRecord::shared()]
        } else {
            Vec::new()
        };
        FileLockInfo {
            path: path.to_path_buf(),
            read_lock_count: self.read_handles,
            write_locked: self.write_handle,
            os_locks,
        }
    }
}

type Registry = HashMap<PathBuf, PathState>;

#[derive(Debug)]
pub(crate) struct ManagerInner {
    registry: Mutex<Registry>,
    released: Condvar,
    poll_interval: Duration,
}

impl ManagerInner {
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, Registry>) -> MutexGuard<'a, Registry> {
        self.released
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Registry>,
        timeout: Duration,
    ) -> MutexGuard<'a, Registry> {
        self.released
            .wait_timeout(guard, timeout)
            .unwrap_or_else(|e| e.into_inner())
            .0
    }

    pub(crate) fn notify_released(&self) {
        self.released.notify_all();
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// Registry of path locks and the sole entry point for acquiring them.
///
/// Each manager owns its own in-process bookkeeping; multiple managers
/// coexist safely. Cross-manager (and cross-process) arbitration happens at
/// the OS advisory-lock level on the sidecar files, never through a manager's
/// private registry. Concurrent same-process contention through two managers
/// surfaces as an overlap fault rather than blocking, because OS advisory
/// locks do not compose across independent handles within one process.
///
/// All methods take `&self`; share a manager across threads by reference or
/// `Arc`.
#[derive(Debug)]
pub struct FileLockManager {
    inner: Arc<ManagerInner>,
}

impl Default for FileLockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLockManager {
    /// Manager with the default bounded-acquisition poll interval.
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Manager that probes the OS lock every `poll_interval` during bounded
    /// acquisitions.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: Mutex::new(HashMap::new()),
                released: Condvar::new(),
                poll_interval,
            }),
        }
    }

    /// Blocking acquire of `path` in the requested mode.
    ///
    /// Ensures parent directories exist and lazily creates the sidecar
    /// `path.lock`. Waits for in-process holders via the registry and for
    /// other processes via the OS advisory lock.
    pub fn acquire_path_lock(&self, path: impl AsRef<Path>, exclusive: bool) -> Result<LockedPath> {
        self.acquire(path.as_ref(), exclusive, None)
    }

    /// Bounded acquire of `path`; a zero `timeout` acts as an immediate
    /// probe. Fails with a timeout fault when not granted in time.
    pub fn try_acquire_path_lock(
        &self,
        path: impl AsRef<Path>,
        exclusive: bool,
        timeout: Duration,
    ) -> Result<LockedPath> {
        self.acquire(path.as_ref(), exclusive, Some(Instant::now() + timeout))
    }

    /// Snapshot of the lock state for `path`, or `None` when nothing is held.
    pub fn lock_info(&self, path: impl AsRef<Path>) -> Option<FileLockInfo> {
        let reg = self.inner.registry();
        reg.get(path.as_ref()).map(|s| s.info(path.as_ref()))
    }

    /// Snapshot of every held path, sorted by path.
    ///
    /// Empty once every handle issued by this manager has been closed.
    pub fn all_lock_infos(&self) -> Vec<FileLockInfo> {
        let reg = self.inner.registry();
        let mut infos: Vec<FileLockInfo> = reg.iter().map(|(p, s)| s.info(p)).collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        infos
    }

    fn acquire(
        &self,
        path: &Path,
        exclusive: bool,
        deadline: Option<Instant>,
    ) -> Result<LockedPath> {
        let mode = if exclusive {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        };
        let start = Instant::now();
        ensure_parent_dirs(path)?;

        let key = path.to_path_buf();
        let mut reg = self.inner.registry();
        loop {
            if !reg.contains_key(&key) {
                let lock = ReadWriteFileLock::open(&sidecar_path(path), true)?;
                tracing::debug!(path = %path.display(), "registered path lock entry");
                reg.insert(key.clone(), PathState::new(lock));
            }
            let Some(state) = reg.get_mut(&key) else {
                continue;
            };

            let available = if exclusive {
                state.is_idle()
            } else {
                !state.write_handle
            };

            if available {
                if exclusive {
                    state.write_handle = true;
                } else {
                    state.read_handles += 1;
                }
                let lock = state.lock.clone();
                drop(reg);

                let engaged = lock.engage(mode, deadline, self.inner.poll_interval);
                return match engaged {
                    Ok(true) => Ok(LockedPath::new(
                        Arc::clone(&self.inner),
                        key,
                        path.to_path_buf(),
                        mode,
                    )),
                    Ok(false) => {
                        self.rollback(&key, exclusive);
                        Err(HaspError::Timeout {
                            path: key,
                            mode,
                            waited: start.elapsed(),
                        })
                    }
                    Err(e) => {
                        self.rollback(&key, exclusive);
                        Err(e)
                    }
                };
            }

            match deadline {
                None => reg = self.inner.wait(reg),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.remove_if_idle(&mut reg, &key);
                        return Err(HaspError::Timeout {
                            path: key,
                            mode,
                            waited: start.elapsed(),
                        });
                    }
                    reg = self.inner.wait_timeout(reg, deadline - now);
                }
            }
        }
    }

    /// Undo a reserved acquisition that failed or timed out at the OS level.
    ///
    /// The sidecar file is intentionally left on disk: another process may
    /// hold the lock through it, and stray sidecars are reclaimed by
    /// `hasp clean`.
    fn rollback(&self, key: &PathBuf, exclusive: bool) {
        let mut reg = self.inner.registry();
        if let Some(state) = reg.get_mut(key) {
            if exclusive {
                state.write_handle = false;
            } else {
                state.read_handles = state.read_handles.saturating_sub(1);
            }
        }
        self.remove_if_idle(&mut reg, key);
        drop(reg);
        self.inner.notify_released();
    }

    fn remove_if_idle(&self, reg: &mut MutexGuard<'_, Registry>, key: &PathBuf) {
        if reg.get(key).is_some_and(|s| s.is_idle()) {
            reg.remove(key);
        }
    }
}

fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    Ok(())
}
