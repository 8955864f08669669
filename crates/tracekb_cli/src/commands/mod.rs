//! CLI command implementations.

pub mod locks;

use std::path::Path;
use tracekb_core::{Config, LockBackend, LockTimeout, Registry, Store};

/// Opens an existing store with file locks, without waiting on any lock.
///
/// Nothing is written: a store without the given root is an error.
pub fn open_store(path: &Path, root: &str) -> Result<Store, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    tracing::debug!(path = %path.display(), root, "opening store");
    let config = Config::new(LockTimeout::IMMEDIATE)
        .lock_backend(LockBackend::File)
        .create_if_missing(false)
        .create_root(false)
        .root_uri(root);
    Ok(Store::open(path, config, Registry::with_trace_kinds())?)
}
