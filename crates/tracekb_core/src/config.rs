//! Store configuration.

use crate::lock::LockTimeout;
use std::time::Duration;

/// Which lock manager a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBackend {
    /// Marker files under `<store>/locks/`, shared by every process.
    /// Requires a file store.
    File,
    /// In-process locks, for stores used by one process.
    Process,
    /// No locking at all, for a single caller.
    Null,
}

/// Configuration for opening a store.
///
/// There is no default lock timeout: callers state whether compound edits
/// wait indefinitely or give up after a bound.
#[derive(Debug, Clone)]
pub struct Config {
    /// How long compound edits wait for a container lock.
    pub lock_timeout: LockTimeout,

    /// Which lock manager to use.
    pub lock_backend: LockBackend,

    /// Delay between two attempts of the file lock manager.
    pub lock_poll_interval: Duration,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to create the root container if the store has none. Offline
    /// tools turn it off so that opening a store never writes to it.
    pub create_root: bool,

    /// IRI of the root container, created with a new store.
    pub root_uri: String,
}

impl Config {
    /// Creates a configuration with the given lock timeout.
    #[must_use]
    pub fn new(lock_timeout: LockTimeout) -> Self {
        Self {
            lock_timeout,
            lock_backend: LockBackend::Process,
            lock_poll_interval: Duration::from_millis(10),
            create_if_missing: true,
            create_root: true,
            root_uri: "http://localhost:8001/".to_string(),
        }
    }

    /// Sets the lock manager.
    #[must_use]
    pub const fn lock_backend(mut self, backend: LockBackend) -> Self {
        self.lock_backend = backend;
        self
    }

    /// Sets the lock polling interval.
    #[must_use]
    pub const fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.lock_poll_interval = interval;
        self
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to create a missing root container.
    #[must_use]
    pub const fn create_root(mut self, value: bool) -> Self {
        self.create_root = value;
        self
    }

    /// Sets the root container IRI.
    #[must_use]
    pub fn root_uri(mut self, uri: impl Into<String>) -> Self {
        self.root_uri = uri.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config() {
        let config = Config::new(LockTimeout::Indefinite);
        assert_eq!(config.lock_timeout, LockTimeout::Indefinite);
        assert_eq!(config.lock_backend, LockBackend::Process);
        assert!(config.create_if_missing);
        assert!(config.create_root);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new(LockTimeout::Bounded(Duration::from_secs(2)))
            .lock_backend(LockBackend::Null)
            .create_if_missing(false)
            .root_uri("http://host/");

        assert_eq!(config.lock_backend, LockBackend::Null);
        assert!(!config.create_if_missing);
        assert_eq!(config.root_uri, "http://host/");
    }
}
