//! Edit transactions.
//!
//! An [`EditTransaction`] stages changes to one resource's fragment. Nothing
//! reaches the store before [`EditTransaction::commit`]:
//!
//! 1. `added` / `removed` are computed against the snapshot taken at begin
//! 2. under the store's write section, they are rebased on the current
//!    fragment, and the result is validated (generic contract, then
//!    kind-specific checks)
//! 3. a valid result is applied and the version advanced
//! 4. the kind's commit acknowledgement runs; if it fails, the commit is
//!    reverted and the failure returned
//!
//! Dropping an uncommitted transaction rolls it back.

use crate::contract::{CheckContext, EditMode};
use crate::error::{CoreError, CoreResult, Diagnosis};
use crate::etag::EntityTag;
use crate::identifier::Iri;
use crate::kind::{CommitInfo, ResourceKind};
use crate::store::Store;
use crate::vocab::RDF_TYPE;
use std::sync::Arc;
use tracekb_storage::{FragmentUpdate, Graph, MetaUpdate, ResourceMeta, Term, Triple};
use tracing::{debug, error, warn};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is staging changes.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    /// The committed resource.
    pub uri: Iri,
    /// Version after the commit.
    pub version: u64,
    /// Entity tag of the committed statements.
    pub etag: EntityTag,
    /// False for a no-op commit (nothing added or removed).
    pub changed: bool,
    /// Number of statements added.
    pub added: usize,
    /// Number of statements removed.
    pub removed: usize,
}

/// A staged edit of one resource.
pub struct EditTransaction<'s> {
    store: &'s Store,
    uri: Iri,
    kind: Arc<dyn ResourceKind>,
    mode: EditMode,
    snapshot: Graph,
    staged: Graph,
    /// `None` when the transaction creates the resource.
    base_meta: Option<ResourceMeta>,
    touch: bool,
    state: TransactionState,
}

impl<'s> EditTransaction<'s> {
    /// Begins an edit of an existing resource.
    pub(crate) fn begin(store: &'s Store, uri: &Iri, mode: EditMode) -> CoreResult<Self> {
        let fragment = store.backend().fragment(uri.as_str())?;
        let meta = fragment
            .meta
            .clone()
            .ok_or_else(|| CoreError::not_found(uri.as_str()))?;
        let kind = store.kind_of_fragment(uri.as_str(), &fragment)?;

        debug!(uri = %uri, ?mode, version = meta.version, "edit begun");
        Ok(Self {
            store,
            uri: uri.clone(),
            kind,
            mode,
            snapshot: fragment.graph.clone(),
            staged: fragment.graph,
            base_meta: Some(meta),
            touch: false,
            state: TransactionState::Active,
        })
    }

    /// Begins the initial transaction of a new resource.
    ///
    /// The staged graph starts with the resource's declared type.
    pub(crate) fn create(
        store: &'s Store,
        uri: &Iri,
        kind: Arc<dyn ResourceKind>,
    ) -> CoreResult<Self> {
        let fragment = store.backend().fragment(uri.as_str())?;
        if fragment.exists() {
            return Err(CoreError::AlreadyExists {
                uri: uri.to_string(),
            });
        }

        let mut staged = fragment.graph.clone();
        staged.insert(Triple::new(
            Term::iri(uri.as_str()),
            RDF_TYPE,
            Term::iri(kind.rdf_type()),
        ));

        debug!(uri = %uri, kind = kind.rdf_type(), "creation begun");
        Ok(Self {
            store,
            uri: uri.clone(),
            kind,
            mode: EditMode::Internal,
            snapshot: fragment.graph,
            staged,
            base_meta: None,
            touch: false,
            state: TransactionState::Active,
        })
    }

    /// The edited resource.
    #[must_use]
    pub fn uri(&self) -> &Iri {
        &self.uri
    }

    /// How the edit was requested.
    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// The kind of the edited resource.
    #[must_use]
    pub fn kind(&self) -> &dyn ResourceKind {
        &*self.kind
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// The fragment as it was when the transaction began.
    #[must_use]
    pub fn snapshot(&self) -> &Graph {
        &self.snapshot
    }

    /// The staged fragment.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.staged
    }

    /// Mutable access to the staged fragment.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.staged
    }

    /// Stages a statement.
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.staged.insert(triple)
    }

    /// Unstages a statement.
    pub fn remove(&mut self, triple: &Triple) -> bool {
        self.staged.remove(triple)
    }

    /// Stages `<uri> <predicate> <object>`.
    pub fn add(&mut self, predicate: &str, object: Term) -> bool {
        let subject = Term::iri(self.uri.as_str());
        self.staged.insert(Triple::new(subject, predicate, object))
    }

    /// Removes every outgoing `predicate` statement.
    pub fn remove_all(&mut self, predicate: &str) {
        let uri = self.uri.as_str();
        self.staged
            .retain(|t| !(t.subject.is_iri(uri) && t.predicate == predicate));
    }

    /// Replaces every outgoing `predicate` statement with one to `object`.
    pub fn set(&mut self, predicate: &str, object: Term) {
        self.remove_all(predicate);
        self.add(predicate, object);
    }

    /// Advances the version on commit even if nothing changed.
    pub fn request_touch(&mut self) {
        self.touch = true;
    }

    /// Statements added and removed relative to the snapshot.
    #[must_use]
    pub fn changes(&self) -> (Graph, Graph) {
        (
            self.staged.difference(&self.snapshot),
            self.snapshot.difference(&self.staged),
        )
    }

    /// Validates the staged fragment as it stands, without committing.
    #[must_use]
    pub fn diagnose(&self) -> Diagnosis {
        let (added, removed) = self.changes();
        diagnose(&*self.kind, &self.uri, &self.staged, &added, &removed, self.mode)
    }

    /// Commits the staged changes.
    ///
    /// # Errors
    ///
    /// - `Validation` if the resulting fragment breaks the kind's contract
    /// - `NotFound` / `AlreadyExists` if the resource vanished or appeared
    ///   concurrently
    /// - whatever the kind's commit acknowledgement returns
    ///
    /// On error the store is left as it was before the transaction.
    pub fn commit(mut self) -> CoreResult<CommitReport> {
        self.ensure_active()?;
        let result = self.commit_inner();
        self.state = match result {
            Ok(_) => TransactionState::Committed,
            Err(_) => TransactionState::RolledBack,
        };
        result
    }

    /// Discards the staged changes.
    pub fn rollback(mut self) {
        if self.state == TransactionState::Active {
            debug!(uri = %self.uri, "edit rolled back");
            self.state = TransactionState::RolledBack;
        }
    }

    fn commit_inner(&self) -> CoreResult<CommitReport> {
        let (added, removed) = self.changes();
        let created = self.base_meta.is_none();

        if added.is_empty() && removed.is_empty() && !self.touch && !created {
            debug!(uri = %self.uri, "no-op commit");
            let version = self.base_meta.as_ref().map_or(0, |m| m.version);
            return Ok(CommitReport {
                uri: self.uri.clone(),
                version,
                etag: EntityTag::for_graph(&self.snapshot),
                changed: false,
                added: 0,
                removed: 0,
            });
        }

        let uri = self.uri.as_str();
        let mut guard = self.store.backend().write()?;
        let current = guard.fragment(uri)?;
        match (&self.base_meta, &current.meta) {
            (None, Some(_)) => {
                return Err(CoreError::AlreadyExists {
                    uri: uri.to_string(),
                })
            }
            (Some(_), None) => return Err(CoreError::not_found(uri)),
            _ => {}
        }

        // Rebase on what is committed now, so that the checked statement
        // set is exactly the one written.
        let mut result = current.graph.clone();
        for triple in &removed {
            result.remove(triple);
        }
        result.extend(added.iter().cloned());

        let diagnosis = diagnose(&*self.kind, &self.uri, &result, &added, &removed, self.mode);
        if !diagnosis.is_valid() {
            drop(guard);
            warn!(uri, %diagnosis, "edit rejected");
            return Err(CoreError::validation(uri, diagnosis));
        }

        let to_add = result.difference(&current.graph);
        let to_remove = current.graph.difference(&result);
        let version = current.meta.as_ref().map_or(0, |m| m.version) + 1;
        guard.apply(
            uri,
            FragmentUpdate {
                added: to_add.clone(),
                removed: to_remove.clone(),
                meta: MetaUpdate::Set(ResourceMeta {
                    kind: self.kind.rdf_type().to_string(),
                    version,
                }),
            },
        )?;
        guard.commit()?;

        let info = CommitInfo {
            uri: self.uri.clone(),
            version,
            added: to_add,
            removed: to_remove,
            created,
            mode: self.mode,
        };
        if let Err(e) = self.kind.on_commit(self.store, &info) {
            warn!(uri, error = %e, "commit acknowledgement failed, reverting");
            if let Err(revert) = self.revert(&info, current.meta) {
                error!(uri, error = %revert, "revert failed");
                return Err(revert);
            }
            return Err(e);
        }

        debug!(
            uri,
            version,
            added = info.added.len(),
            removed = info.removed.len(),
            "edit committed"
        );
        Ok(CommitReport {
            uri: self.uri.clone(),
            version,
            etag: EntityTag::for_graph(&result),
            changed: !(info.added.is_empty() && info.removed.is_empty()),
            added: info.added.len(),
            removed: info.removed.len(),
        })
    }

    /// Undoes a published commit whose acknowledgement failed.
    ///
    /// Only the commit itself is undone: if another writer committed the
    /// resource in the meantime, nothing is written and the conflict is
    /// returned.
    fn revert(&self, info: &CommitInfo, previous: Option<ResourceMeta>) -> CoreResult<()> {
        let mut guard = self.store.backend().write()?;
        let committed = guard.fragment(info.uri.as_str())?.meta.map(|m| m.version);
        if committed != Some(info.version) {
            return Err(CoreError::ConcurrentModification {
                uri: info.uri.to_string(),
            });
        }
        guard.apply(
            info.uri.as_str(),
            FragmentUpdate {
                added: info.removed.clone(),
                removed: info.added.clone(),
                meta: previous.map_or(MetaUpdate::Remove, MetaUpdate::Set),
            },
        )?;
        guard.commit()?;
        Ok(())
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::RolledBack => Err(CoreError::invalid_operation(
                "transaction already rolled back",
            )),
        }
    }
}

impl Drop for EditTransaction<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            debug!(uri = %self.uri, "uncommitted edit dropped");
        }
    }
}

impl std::fmt::Debug for EditTransaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditTransaction")
            .field("uri", &self.uri)
            .field("kind", &self.kind.rdf_type())
            .field("mode", &self.mode)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Runs the generic contract checks, then the kind's own.
fn diagnose(
    kind: &dyn ResourceKind,
    uri: &Iri,
    graph: &Graph,
    added: &Graph,
    removed: &Graph,
    mode: EditMode,
) -> Diagnosis {
    let ctx = CheckContext {
        uri: uri.as_str(),
        graph,
        added,
        removed,
        mode,
    };
    let mut diagnosis = Diagnosis::new();
    kind.contract().check(&ctx, &mut diagnosis);
    kind.check(&ctx, &mut diagnosis);
    diagnosis
}
