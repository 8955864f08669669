//! Offline lock recovery.
//!
//! A process that dies while holding a container lock leaves it held. These
//! operations reset the lock subsystem; they never read or write resource
//! statements, only the bookkeeping listing which resources exist.
//!
//! Never run [`sweep_locks`] against a store that is in use: it breaks
//! locks that are legitimately held.

use crate::error::CoreResult;
use crate::identifier::Iri;
use crate::lock::LockName;
use crate::store::Store;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Lock state of a lock-protected resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    /// The resource.
    pub uri: Iri,
    /// Its lock.
    pub lock: LockName,
    /// Whether the lock is currently held.
    pub held: bool,
}

/// Resources whose type is lock-protected, in IRI order.
///
/// # Errors
///
/// Returns an error if the store's bookkeeping cannot be read.
pub fn list_lock_protected_resources(store: &Store) -> CoreResult<Vec<Iri>> {
    let protected: BTreeSet<&str> = store
        .registry()
        .lock_protected_types()
        .into_iter()
        .collect();
    store
        .backend()
        .resources()?
        .into_iter()
        .filter(|(_, meta)| protected.contains(meta.kind.as_str()))
        .map(|(uri, _)| Iri::new(uri))
        .collect()
}

/// Lock state of every lock-protected resource.
///
/// # Errors
///
/// Returns an error if the bookkeeping or the lock manager cannot be read.
pub fn lock_status(store: &Store) -> CoreResult<Vec<LockStatus>> {
    list_lock_protected_resources(store)?
        .into_iter()
        .map(|uri| {
            let lock = LockName::for_uri(uri.as_str());
            let held = store.lock_manager().is_held(&lock)?;
            Ok(LockStatus { uri, lock, held })
        })
        .collect()
}

/// Releases the lock of `uri`, whoever holds it. Returns true if it was held.
///
/// # Errors
///
/// Returns an error if the lock manager fails.
pub fn force_unlock(store: &Store, uri: &Iri) -> CoreResult<bool> {
    let lock = LockName::for_uri(uri.as_str());
    let released = store.lock_manager().force_unlock(&lock)?;
    if released {
        info!(uri = %uri, lock = %lock, "lock force-released");
    }
    Ok(released)
}

/// Releases every held lock of a lock-protected resource.
///
/// Returns the locks that were held.
///
/// # Errors
///
/// Returns an error if the bookkeeping or the lock manager cannot be read.
pub fn sweep_locks(store: &Store) -> CoreResult<Vec<LockName>> {
    let mut released = Vec::new();
    for uri in list_lock_protected_resources(store)? {
        if force_unlock(store, &uri)? {
            released.push(LockName::for_uri(uri.as_str()));
        }
    }
    if !released.is_empty() {
        warn!(count = released.len(), "stale locks swept");
    }
    Ok(released)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LockBackend};
    use crate::lock::{FileLockManager, LockManager, LockTimeout};
    use crate::registry::Registry;
    use crate::store::LOCK_DIR;
    use crate::vocab::ktbs;
    use tempfile::tempdir;

    #[test]
    fn lists_containers_only() {
        let store = Store::in_memory(
            Config::new(LockTimeout::IMMEDIATE),
            Registry::with_trace_kinds(),
        )
        .unwrap();
        let base = store
            .post(store.root(), ktbs::BASE, Some("b1"), |_| Ok(()))
            .unwrap();
        store
            .post(&base, ktbs::METHOD, Some("m"), |tx| {
                tx.add(
                    ktbs::HAS_PARENT_METHOD,
                    tracekb_storage::Term::iri(crate::vocab::builtin::FILTER),
                );
                Ok(())
            })
            .unwrap();

        let listed = list_lock_protected_resources(&store).unwrap();
        assert_eq!(listed, vec![store.root().clone(), base]);
        assert!(lock_status(&store).unwrap().iter().all(|s| !s.held));
        assert!(sweep_locks(&store).unwrap().is_empty());
    }

    #[test]
    fn sweep_releases_lock_of_dead_holder() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("store");
        let config = Config::new(LockTimeout::IMMEDIATE).lock_backend(LockBackend::File);
        let store = Store::open(&path, config, Registry::with_trace_kinds()).unwrap();
        let base = store
            .post(store.root(), ktbs::BASE, Some("base1"), |_| Ok(()))
            .unwrap();

        // Another handle on the same directory takes the lock and never
        // releases it, as a crashed process would.
        let other = FileLockManager::open(&path.join(LOCK_DIR)).unwrap();
        let lock = LockName::for_uri(base.as_str());
        other.acquire(&lock, LockTimeout::IMMEDIATE).unwrap();
        assert!(store.lock(&base).is_err());

        let status = lock_status(&store).unwrap();
        assert!(status.iter().any(|s| s.uri == base && s.held));

        assert_eq!(sweep_locks(&store).unwrap(), vec![lock.clone()]);
        store
            .lock_manager()
            .acquire(&lock, LockTimeout::IMMEDIATE)
            .unwrap();
        store.lock_manager().release(&lock).unwrap();
    }
}
