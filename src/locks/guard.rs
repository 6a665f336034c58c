//! The capability handle for one granted path lock.

use crate::error::{HaspError, Result};
use crate::locks::manager::ManagerInner;
use crate::locks::sidecar::sidecar_path;
use crate::locks::types::LockMode;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A granted lock over one path, issued by
/// [`crate::locks::FileLockManager`].
///
/// The handle is a scoped resource: dropping it releases the hold, and on the
/// last release for a path the manager retires the registry entry and deletes
/// the sidecar file. Prefer an explicit [`LockedPath::close`] so release
/// errors are observable.
///
/// Mode transitions ([`LockedPath::to_shared`], [`LockedPath::to_exclusive`])
/// and ownership transfer ([`LockedPath::steal`]) mint a fresh handle and
/// permanently invalidate the source; an invalidated handle never becomes
/// usable again.
#[derive(Debug)]
pub struct LockedPath {
    manager: Arc<ManagerInner>,
    /// Registry key: the path the lock was originally acquired for.
    key: PathBuf,
    /// Reported path; diverges from `key` after `steal_with_path`.
    path: PathBuf,
    mode: LockMode,
    valid: bool,
}

impl LockedPath {
    pub(crate) fn new(
        manager: Arc<ManagerInner>,
        key: PathBuf,
        path: PathBuf,
        mode: LockMode,
    ) -> Self {
        Self {
            manager,
            key,
            path,
            mode,
            valid: true,
        }
    }

    /// Whether this handle still represents a granted lock.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the held mode is shared (read).
    pub fn is_shared(&self) -> bool {
        self.mode.is_shared()
    }

    /// The path this handle reports protecting.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The held mode.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Atomically downgrade an exclusive hold to shared.
    ///
    /// Valid only on an exclusive handle. The OS lock is converted in place;
    /// no window exists where the path is unlocked. Returns the new shared
    /// handle and invalidates `self`.
    pub fn to_shared(&mut self) -> Result<LockedPath> {
        self.ensure_valid()?;
        if self.mode.is_shared() {
            return Err(HaspError::InvalidHandle {
                path: self.path.clone(),
                reason: "handle is already shared".to_string(),
            });
        }

        let mut reg = self.manager.registry();
        {
            let Some(state) = reg.get_mut(&self.key) else {
                return Err(self.missing_entry());
            };
            state.lock.downgrade()?;
            state.write_handle = false;
            state.read_handles = 1;
        }
        drop(reg);
        self.manager.notify_released();

        self.valid = false;
        Ok(self.successor(self.path.clone(), LockMode::Shared))
    }

    /// Upgrade a shared hold to exclusive, waiting as long as it takes for
    /// every other holder to release.
    ///
    /// Valid only on a shared handle that is (or becomes) the sole holder.
    /// Returns the new exclusive handle and invalidates `self`.
    pub fn to_exclusive(&mut self) -> Result<LockedPath> {
        self.upgrade_inner(None)
    }

    /// Bounded [`LockedPath::to_exclusive`]. A zero timeout acts as an
    /// immediate probe.
    ///
    /// On timeout the original handle is untouched: still valid, still
    /// shared, nothing partially transitioned.
    pub fn to_exclusive_timeout(&mut self, timeout: Duration) -> Result<LockedPath> {
        self.upgrade_inner(Some(Instant::now() + timeout))
    }

    /// Transfer ownership to a fresh handle without any release/acquire
    /// cycle: the new handle wraps the identical OS lock and mode, and `self`
    /// is invalidated. No third party can contend for the lock in between.
    pub fn steal(&mut self) -> Result<LockedPath> {
        self.ensure_valid()?;
        self.valid = false;
        Ok(self.successor(self.path.clone(), self.mode))
    }

    /// Like [`LockedPath::steal`], but the new handle reports `new_path`.
    ///
    /// Used when the protected resource is renamed or finalized on disk while
    /// the same lock continues to apply. Coordination stays on the original
    /// sidecar.
    pub fn steal_with_path(&mut self, new_path: impl Into<PathBuf>) -> Result<LockedPath> {
        self.ensure_valid()?;
        self.valid = false;
        Ok(self.successor(new_path.into(), self.mode))
    }

    /// Release this handle's hold. Idempotent.
    ///
    /// On the last release for the path, the registry entry is retired and
    /// the sidecar file deleted.
    pub fn close(&mut self) -> Result<()> {
        if !self.valid {
            return Ok(());
        }
        self.valid = false;

        let mut reg = self.manager.registry();
        let (unlock_result, idle) = {
            let Some(state) = reg.get_mut(&self.key) else {
                return Err(self.missing_entry());
            };
            let result = match self.mode {
                LockMode::Exclusive => {
                    state.write_handle = false;
                    state.lock.release(LockMode::Exclusive)
                }
                LockMode::Shared => {
                    state.read_handles = state.read_handles.saturating_sub(1);
                    state.lock.release(LockMode::Shared)
                }
            };
            (result, state.is_idle())
        };

        let mut removal_result = Ok(());
        if idle {
            reg.remove(&self.key);
            let sidecar = sidecar_path(&self.key);
            match fs::remove_file(&sidecar) {
                Ok(()) => {
                    tracing::debug!(sidecar = %sidecar.display(), "removed sidecar lock file");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => removal_result = Err(crate::error::io_err(&sidecar, e)),
            }
        }
        drop(reg);
        self.manager.notify_released();

        unlock_result?;
        removal_result
    }

    fn upgrade_inner(&mut self, deadline: Option<Instant>) -> Result<LockedPath> {
        self.ensure_valid()?;
        if !self.mode.is_shared() {
            return Err(HaspError::InvalidHandle {
                path: self.path.clone(),
                reason: "only a shared handle can upgrade to exclusive".to_string(),
            });
        }

        let start = Instant::now();
        let mut reg = self.manager.registry();
        loop {
            let sole_holder = match reg.get_mut(&self.key) {
                None => return Err(self.missing_entry()),
                Some(state) if state.read_handles == 1 && !state.write_handle => {
                    state.read_handles = 0;
                    state.write_handle = true;
                    Some(state.lock.clone())
                }
                Some(_) => None,
            };

            if let Some(lock) = sole_holder {
                drop(reg);
                match lock.upgrade(deadline, self.manager.poll_interval()) {
                    Ok(true) => {
                        self.valid = false;
                        return Ok(self.successor(self.path.clone(), LockMode::Exclusive));
                    }
                    not_granted => {
                        // Nothing changed from the caller's point of view:
                        // the shared OS hold was restored, so restore the
                        // registry reservation to match.
                        let mut reg = self.manager.registry();
                        if let Some(state) = reg.get_mut(&self.key) {
                            state.write_handle = false;
                            state.read_handles = 1;
                        }
                        drop(reg);
                        self.manager.notify_released();
                        return Err(match not_granted {
                            Err(e) => e,
                            Ok(_) => self.timeout(start),
                        });
                    }
                }
            }

            match deadline {
                None => reg = self.manager.wait(reg),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(self.timeout(start));
                    }
                    reg = self.manager.wait_timeout(reg, deadline - now);
                }
            }
        }
    }

    fn successor(&self, path: PathBuf, mode: LockMode) -> LockedPath {
        LockedPath {
            manager: Arc::clone(&self.manager),
            key: self.key.clone(),
            path,
            mode,
            valid: true,
        }
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(HaspError::InvalidHandle {
                path: self.path.clone(),
                reason: "handle has been invalidated".to_string(),
            })
        }
    }

    fn missing_entry(&self) -> HaspError {
        HaspError::InvalidHandle {
            path: self.path.clone(),
            reason: "no registry entry for open handle".to_string(),
        }
    }

    fn timeout(&self, start: Instant) -> HaspError {
        HaspError::Timeout {
            path: self.path.clone(),
            mode: LockMode::Exclusive,
            waited: start.elapsed(),
        }
    }
}

impl Drop for LockedPath {
    fn drop(&mut self) {
        if self.valid
            && let Err(e) = self.close()
        {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release path lock on drop"
            );
        }
    }
}
