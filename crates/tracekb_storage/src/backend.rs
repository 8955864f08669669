//! Graph backend trait definition.

use crate::error::StorageResult;
use crate::model::{Graph, Term, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bookkeeping kept by the store for every resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Declared type IRI of the resource.
    pub kind: String,
    /// Commit counter. Advances on every commit, including touches.
    pub version: u64,
}

/// The statements about one resource, plus its bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Statements where the resource is subject or object.
    pub graph: Graph,
    /// `None` if the resource does not exist.
    pub meta: Option<ResourceMeta>,
}

impl Fragment {
    /// Returns true if the resource exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.meta.is_some()
    }
}

/// What to do with a resource's bookkeeping on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaUpdate {
    /// Leave the bookkeeping untouched.
    Keep,
    /// Replace the bookkeeping.
    Set(ResourceMeta),
    /// Forget the resource.
    Remove,
}

/// A change to apply to the shared graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentUpdate {
    /// Statements to insert.
    pub added: Graph,
    /// Statements to delete.
    pub removed: Graph,
    /// Bookkeeping change.
    pub meta: MetaUpdate,
}

/// A shared graph store.
///
/// Backends own one graph shared by every resource, and a bookkeeping
/// record per resource. Reads return a consistent view of a resource's
/// fragment. Writes go through a [`WriteGuard`], which serializes writers
/// (across threads, and across processes for backends that support it).
///
/// # Invariants
///
/// - Updates applied through a guard become visible atomically on
///   [`WriteGuard::commit`]
/// - Dropping a guard without committing discards every applied update
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryGraph`] - For testing and single-process stores
/// - [`super::FileGraph`] - For stores shared by several processes
pub trait GraphBackend: Send + Sync + fmt::Debug {
    /// Reads the committed fragment of `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn fragment(&self, uri: &str) -> StorageResult<Fragment>;

    /// Reads the bookkeeping of `uri`, `None` if the resource does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn meta(&self, uri: &str) -> StorageResult<Option<ResourceMeta>>;

    /// Lists every resource with its bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn resources(&self) -> StorageResult<Vec<(String, ResourceMeta)>>;

    /// Opens an exclusive write section.
    ///
    /// Blocks until no other writer holds the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be locked or loaded.
    fn write(&self) -> StorageResult<Box<dyn WriteGuard + '_>>;
}

/// An exclusive write section over a [`GraphBackend`].
pub trait WriteGuard {
    /// Reads the fragment of `uri` as seen by this writer.
    ///
    /// Reflects updates already applied through this guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage cannot be read.
    fn fragment(&self, uri: &str) -> StorageResult<Fragment>;

    /// Applies an update to the resource `uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update cannot be staged.
    fn apply(&mut self, uri: &str, update: FragmentUpdate) -> StorageResult<()>;

    /// Publishes every applied update and releases the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the updates cannot be persisted. Nothing is
    /// published in that case.
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// The complete contents of a graph store.
///
/// Shared by backends as their in-memory representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    /// Every statement in the store.
    pub graph: Graph,
    /// Bookkeeping by resource IRI.
    pub resources: BTreeMap<String, ResourceMeta>,
}

impl GraphState {
    /// Extracts the fragment of `uri`.
    #[must_use]
    pub fn fragment(&self, uri: &str) -> Fragment {
        Fragment {
            graph: self.graph.about(uri),
            meta: self.resources.get(uri).cloned(),
        }
    }

    /// Applies an update in place.
    pub fn apply(&mut self, uri: &str, update: FragmentUpdate) {
        for triple in &update.removed {
            self.graph.remove(triple);
        }
        self.graph.extend(update.added);
        match update.meta {
            MetaUpdate::Keep => {}
            MetaUpdate::Set(meta) => {
                self.resources.insert(uri.to_string(), meta);
            }
            MetaUpdate::Remove => {
                self.resources.remove(uri);
            }
        }
    }

    /// Lists resources in IRI order.
    #[must_use]
    pub fn list(&self) -> Vec<(String, ResourceMeta)> {
        self.resources
            .iter()
            .map(|(uri, meta)| (uri.clone(), meta.clone()))
            .collect()
    }

    /// Returns true if the state contains any statement about `uri`.
    #[must_use]
    pub fn mentions(&self, uri: &str) -> bool {
        let term = Term::iri(uri);
        self.graph
            .iter()
            .any(|t: &Triple| t.subject == term || t.object == term)
    }
}
