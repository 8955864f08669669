//! In-memory graph backend.

use crate::backend::{
    Fragment, FragmentUpdate, GraphBackend, GraphState, ResourceMeta, WriteGuard,
};
use crate::error::StorageResult;
use parking_lot::{RwLock, RwLockWriteGuard};

/// An in-memory graph backend.
///
/// This backend keeps the whole store in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Single-process deployments that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads. Writers
/// are serialized by an internal lock.
///
/// # Example
///
/// ```rust
/// use tracekb_storage::{
///     FragmentUpdate, Graph, GraphBackend, InMemoryGraph, MetaUpdate, WriteGuard,
/// };
///
/// let backend = InMemoryGraph::new();
/// let mut guard = backend.write().unwrap();
/// guard
///     .apply(
///         "http://ex.org/a",
///         FragmentUpdate { added: Graph::new(), removed: Graph::new(), meta: MetaUpdate::Keep },
///     )
///     .unwrap();
/// guard.commit().unwrap();
/// ```
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    state: RwLock<GraphState>,
}

impl InMemoryGraph {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend with pre-existing contents.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_state(state: GraphState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Returns a copy of the whole store.
    #[must_use]
    pub fn state(&self) -> GraphState {
        self.state.read().clone()
    }
}

impl GraphBackend for InMemoryGraph {
    fn fragment(&self, uri: &str) -> StorageResult<Fragment> {
        Ok(self.state.read().fragment(uri))
    }

    fn meta(&self, uri: &str) -> StorageResult<Option<ResourceMeta>> {
        Ok(self.state.read().resources.get(uri).cloned())
    }

    fn resources(&self) -> StorageResult<Vec<(String, ResourceMeta)>> {
        Ok(self.state.read().list())
    }

    fn write(&self) -> StorageResult<Box<dyn WriteGuard + '_>> {
        Ok(Box::new(MemoryWriteGuard {
            state: self.state.write(),
            staged: None,
        }))
    }
}

/// Write section of an [`InMemoryGraph`].
///
/// The committed state is copied on the first `apply`, so an abandoned
/// guard leaves the store untouched.
struct MemoryWriteGuard<'a> {
    state: RwLockWriteGuard<'a, GraphState>,
    staged: Option<GraphState>,
}

impl WriteGuard for MemoryWriteGuard<'_> {
    fn fragment(&self, uri: &str) -> StorageResult<Fragment> {
        let state = self.staged.as_ref().unwrap_or(&*self.state);
        Ok(state.fragment(uri))
    }

    fn apply(&mut self, uri: &str, update: FragmentUpdate) -> StorageResult<()> {
        let staged = self.staged.get_or_insert_with(|| (*self.state).clone());
        staged.apply(uri, update);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        if let Some(staged) = self.staged.take() {
            *self.state = staged;
        }
        Ok(())
    }
}
