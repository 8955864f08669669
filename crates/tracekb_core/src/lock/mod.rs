//! Named binary locks protecting compound edits.
//!
//! A lock is keyed by a resource IRI. Its name is derived by replacing every
//! `/` with `-` and prefixing the result with `/`:
//!
//! ```text
//! http://host/base1/   ->   /http:--host-base1-
//! ```
//!
//! The derivation is shared with offline tooling and must stay stable.
//!
//! Implementations:
//! - [`FileLockManager`] - marker files, visible to every process sharing a store
//! - [`ProcessLockManager`] - threads of one process only
//! - [`NullLockManager`] - no locking, for single-caller deployments

mod file;
mod null;
mod process;

pub use file::FileLockManager;
pub use null::NullLockManager;
pub use process::ProcessLockManager;

use crate::error::CoreResult;
use std::fmt;
use std::time::{Duration, Instant};

/// Derived name of a lock.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockName(String);

impl LockName {
    /// Derives the lock name of a resource IRI.
    #[must_use]
    pub fn for_uri(uri: &str) -> Self {
        Self(format!("/{}", uri.replace('/', "-")))
    }

    /// The name text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How long `acquire` may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeout {
    /// Wait until the lock is free.
    Indefinite,
    /// Give up with `Busy` after this long. Zero means a single attempt.
    Bounded(Duration),
}

impl LockTimeout {
    /// A single attempt, no waiting.
    pub const IMMEDIATE: Self = Self::Bounded(Duration::ZERO);

    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            Self::Indefinite => None,
            Self::Bounded(timeout) => Instant::now().checked_add(timeout),
        }
    }

    pub(crate) fn waited(self) -> Duration {
        match self {
            Self::Indefinite => Duration::MAX,
            Self::Bounded(timeout) => timeout,
        }
    }
}

/// A manager of named binary locks.
///
/// # Contract
///
/// - `acquire` blocks until the lock is obtained or the timeout elapses,
///   then fails with `Busy`; it never retries on the caller's behalf
/// - `release` frees a lock; it never fails for a lock the caller holds
/// - `force_unlock` frees a lock regardless of holder (recovery only)
pub trait LockManager: Send + Sync + fmt::Debug {
    /// Acquires the lock `name`.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if the lock is still held when `timeout` elapses.
    fn acquire(&self, name: &LockName, timeout: LockTimeout) -> CoreResult<()>;

    /// Releases the lock `name`.
    ///
    /// # Errors
    ///
    /// Only on backend failure (e.g. an I/O error other than "not held").
    fn release(&self, name: &LockName) -> CoreResult<()>;

    /// Returns true if the lock is currently held by anyone.
    ///
    /// # Errors
    ///
    /// Only on backend failure.
    fn is_held(&self, name: &LockName) -> CoreResult<bool>;

    /// Frees the lock whoever holds it. Returns true if it was held.
    ///
    /// # Errors
    ///
    /// Only on backend failure.
    fn force_unlock(&self, name: &LockName) -> CoreResult<bool>;
}

/// A held lock, released on drop.
pub struct LockGuard<'a> {
    manager: &'a dyn LockManager,
    name: LockName,
}

impl<'a> LockGuard<'a> {
    /// Acquires `name` and wraps it in a guard.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if the lock cannot be acquired in time.
    pub fn acquire(
        manager: &'a dyn LockManager,
        name: LockName,
        timeout: LockTimeout,
    ) -> CoreResult<Self> {
        manager.acquire(&name, timeout)?;
        Ok(Self { manager, name })
    }

    /// The held lock.
    #[must_use]
    pub fn name(&self) -> &LockName {
        &self.name
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.manager.release(&self.name) {
            tracing::warn!(lock = %self.name, error = %e, "failed to release lock");
        }
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("name", &self.name).finish()
    }
}
