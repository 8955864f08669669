//! In-process lock manager.

use super::{LockManager, LockName, LockTimeout};
use crate::error::{CoreError, CoreResult};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;

/// Locks shared by the threads of one process.
///
/// Not visible to other processes; use [`super::FileLockManager`] when
/// several processes share a store.
#[derive(Debug, Default)]
pub struct ProcessLockManager {
    held: Mutex<HashSet<LockName>>,
    released: Condvar,
}

impl ProcessLockManager {
    /// Creates a manager with every lock free.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockManager for ProcessLockManager {
    fn acquire(&self, name: &LockName, timeout: LockTimeout) -> CoreResult<()> {
        let deadline = timeout.deadline();
        let mut held = self.held.lock();
        while held.contains(name) {
            match deadline {
                None => self.released.wait(&mut held),
                Some(deadline) => {
                    if self.released.wait_until(&mut held, deadline).timed_out()
                        && held.contains(name)
                    {
                        return Err(CoreError::Busy {
                            lock: name.clone(),
                            timeout: timeout.waited(),
                        });
                    }
                }
            }
        }
        held.insert(name.clone());
        tracing::debug!(lock = %name, "lock acquired");
        Ok(())
    }

    fn release(&self, name: &LockName) -> CoreResult<()> {
        if self.held.lock().remove(name) {
            self.released.notify_all();
            tracing::debug!(lock = %name, "lock released");
        }
        Ok(())
    }

    fn is_held(&self, name: &LockName) -> CoreResult<bool> {
        Ok(self.held.lock().contains(name))
    }

    fn force_unlock(&self, name: &LockName) -> CoreResult<bool> {
        let was_held = self.held.lock().remove(name);
        if was_held {
            self.released.notify_all();
        }
        Ok(was_held)
    }
}
