//! Store facade.

use crate::config::{Config, LockBackend};
use crate::contract::EditMode;
use crate::error::{CoreError, CoreResult};
use crate::etag::{Comparison, EntityTag, EntityTagSet};
use crate::identifier::{Identifier, Iri};
use crate::kind::ResourceKind;
use crate::lock::{
    FileLockManager, LockGuard, LockManager, LockName, NullLockManager, ProcessLockManager,
};
use crate::method_chain::{MethodChainResolver, Parameters};
use crate::registry::Registry;
use crate::transaction::{CommitReport, EditTransaction};
use crate::vocab::{ktbs, RDF_TYPE};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracekb_storage::{
    FileGraph, Fragment, FragmentUpdate, Graph, GraphBackend, InMemoryGraph, MetaUpdate, Term,
    Triple,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Name of the lock directory inside a file store.
pub const LOCK_DIR: &str = "locks";

/// Options of [`Store::get_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateParams {
    /// Include statements where the resource is object.
    pub incoming: bool,
}

impl Default for StateParams {
    fn default() -> Self {
        Self { incoming: true }
    }
}

/// The resource store.
///
/// `Store` owns the shared graph, the registry of resource kinds and the
/// lock manager. Every read and edit of a resource goes through it:
///
/// ```rust,ignore
/// use tracekb_core::{Config, LockTimeout, Registry, Store};
///
/// let store = Store::in_memory(
///     Config::new(LockTimeout::Indefinite),
///     Registry::with_trace_kinds(),
/// )?;
/// let base = store.post(store.root(), ktbs::BASE, Some("b1"), |_| Ok(()))?;
/// store.edit(&base, EditMode::Append, |tx| {
///     tx.add(RDFS_LABEL, Term::literal("my base"));
///     Ok(())
/// })?;
/// ```
///
/// # Caches
///
/// Container member lists and effective parameters are cached per `Store`
/// value, and refreshed by commit acknowledgements. Member lists are keyed
/// by container version, so edits made by other processes are picked up.
/// Effective parameters are not: a method edited by another process is only
/// seen after [`invalidate_parameters`](Self::invalidate_parameters).
#[derive(Debug)]
pub struct Store {
    backend: Box<dyn GraphBackend>,
    registry: Registry,
    locks: Box<dyn LockManager>,
    config: Config,
    root: Iri,
    members: Mutex<HashMap<Iri, (u64, Vec<Iri>)>>,
    parameters: Mutex<HashMap<Iri, Parameters>>,
}

impl Store {
    /// Creates a store held in memory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `config` asks for file locks, which
    /// need a store directory.
    pub fn in_memory(config: Config, registry: Registry) -> CoreResult<Self> {
        let locks: Box<dyn LockManager> = match config.lock_backend {
            LockBackend::File => {
                return Err(CoreError::invalid_operation(
                    "file locks need a file store",
                ))
            }
            LockBackend::Process => Box::new(ProcessLockManager::new()),
            LockBackend::Null => Box::new(NullLockManager),
        };
        Self::with_backend(Box::new(InMemoryGraph::new()), locks, config, registry)
    }

    /// Opens a store directory, creating it if allowed by `config`.
    ///
    /// File locks live in `<path>/locks/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or its snapshot
    /// cannot be read.
    pub fn open(path: impl AsRef<Path>, config: Config, registry: Registry) -> CoreResult<Self> {
        let path = path.as_ref();
        let backend = FileGraph::open(path, config.create_if_missing)?;
        let locks: Box<dyn LockManager> = match config.lock_backend {
            LockBackend::File => Box::new(
                FileLockManager::open(&path.join(LOCK_DIR))?
                    .with_poll_interval(config.lock_poll_interval),
            ),
            LockBackend::Process => Box::new(ProcessLockManager::new()),
            LockBackend::Null => Box::new(NullLockManager),
        };
        info!(path = %path.display(), new = backend.is_new(), "store opened");
        Self::with_backend(Box::new(backend), locks, config, registry)
    }

    /// Creates a store over explicit backends.
    ///
    /// The root container is created if the backend has none, unless
    /// [`Config::create_root`] is off.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if the root IRI is invalid or not a collection
    /// - `NotFound` if the root is missing and may not be created
    /// - `Configuration` if the root must be created and `registry` has no
    ///   root kind
    pub fn with_backend(
        backend: Box<dyn GraphBackend>,
        locks: Box<dyn LockManager>,
        config: Config,
        registry: Registry,
    ) -> CoreResult<Self> {
        let root = Iri::new(config.root_uri.clone())?;
        if !root.is_collection() {
            return Err(CoreError::invalid_identifier(format!(
                "root IRI <{root}> must end with '/'"
            )));
        }

        let store = Self {
            backend,
            registry,
            locks,
            config,
            root,
            members: Mutex::new(HashMap::new()),
            parameters: Mutex::new(HashMap::new()),
        };
        store.bootstrap()?;
        Ok(store)
    }

    fn bootstrap(&self) -> CoreResult<()> {
        if let Some(meta) = self.backend.meta(self.root.as_str())? {
            if meta.kind != ktbs::KTBS_ROOT {
                return Err(CoreError::corrupted(format!(
                    "root <{}> has type <{}>",
                    self.root, meta.kind
                )));
            }
            return Ok(());
        }

        if !self.config.create_root {
            return Err(CoreError::not_found(self.root.as_str()));
        }
        if !self.registry.contains(ktbs::KTBS_ROOT) {
            return Err(CoreError::configuration("registry has no root kind"));
        }
        let kind = self.registry.get(ktbs::KTBS_ROOT)?;
        match EditTransaction::create(self, &self.root, kind).and_then(EditTransaction::commit) {
            Ok(_) => {
                info!(root = %self.root, "root created");
                Ok(())
            }
            // Another process bootstrapped the same directory first.
            Err(CoreError::AlreadyExists { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// The root container.
    #[must_use]
    pub fn root(&self) -> &Iri {
        &self.root
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The registry of resource kinds.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying graph backend.
    #[must_use]
    pub fn backend(&self) -> &dyn GraphBackend {
        &*self.backend
    }

    /// The lock manager.
    #[must_use]
    pub fn lock_manager(&self) -> &dyn LockManager {
        &*self.locks
    }

    /// Resolves an identifier against the root.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the result is not a valid IRI.
    pub fn resolve<'a>(&self, id: impl Into<Identifier<'a>>) -> CoreResult<Iri> {
        id.into().resolve(&self.root)
    }

    /// Takes the lock of `uri` with the configured timeout.
    ///
    /// Use it to make compound edits of several resources atomic for other
    /// lock holders.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if the lock is not obtained in time.
    pub fn lock(&self, uri: &Iri) -> CoreResult<LockGuard<'_>> {
        LockGuard::acquire(
            &*self.locks,
            LockName::for_uri(uri.as_str()),
            self.config.lock_timeout,
        )
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Checks a fragment against the registry and returns its kind.
    pub(crate) fn kind_of_fragment(
        &self,
        uri: &str,
        fragment: &Fragment,
    ) -> CoreResult<Arc<dyn ResourceKind>> {
        let meta = fragment
            .meta
            .as_ref()
            .ok_or_else(|| CoreError::not_found(uri))?;
        let kind = self.registry.get(&meta.kind)?;
        let declared = Triple::new(Term::iri(uri), RDF_TYPE, Term::iri(&meta.kind));
        if !fragment.graph.contains(&declared) {
            return Err(CoreError::corrupted(format!(
                "<{uri}> is recorded as <{}> but does not declare that type",
                meta.kind
            )));
        }
        Ok(kind)
    }

    /// The kind of an existing resource.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the resource does not exist
    /// - `CorruptedStore` if its type is unknown or undeclared
    pub fn kind_of(&self, uri: &Iri) -> CoreResult<Arc<dyn ResourceKind>> {
        let fragment = self.backend.fragment(uri.as_str())?;
        self.kind_of_fragment(uri.as_str(), &fragment)
    }

    /// Returns true if the resource exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn exists(&self, uri: &Iri) -> CoreResult<bool> {
        Ok(self.backend.meta(uri.as_str())?.is_some())
    }

    /// The committed statements about a resource.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the resource does not exist
    /// - `CorruptedStore` if its type is unknown or undeclared
    pub fn get_state(&self, uri: &Iri, params: StateParams) -> CoreResult<Graph> {
        let fragment = self.backend.fragment(uri.as_str())?;
        self.kind_of_fragment(uri.as_str(), &fragment)?;
        let mut graph = fragment.graph;
        if !params.incoming {
            graph.retain(|t| t.subject.is_iri(uri.as_str()));
        }
        Ok(graph)
    }

    /// The entity tag of a resource, derived from its committed statements.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist.
    pub fn etag(&self, uri: &Iri) -> CoreResult<EntityTag> {
        let fragment = self.backend.fragment(uri.as_str())?;
        if !fragment.exists() {
            return Err(CoreError::not_found(uri.as_str()));
        }
        Ok(EntityTag::for_graph(&fragment.graph))
    }

    /// The version counter of a resource.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist.
    pub fn version(&self, uri: &Iri) -> CoreResult<u64> {
        self.backend
            .meta(uri.as_str())?
            .map(|m| m.version)
            .ok_or_else(|| CoreError::not_found(uri.as_str()))
    }

    /// The container holding `uri`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn container_of(&self, uri: &Iri) -> CoreResult<Option<Iri>> {
        let fragment = self.backend.fragment(uri.as_str())?;
        for triple in fragment.graph.iter().filter(|t| t.object.is_iri(uri.as_str())) {
            let Some(subject) = triple.subject.as_iri() else {
                continue;
            };
            let Some(meta) = self.backend.meta(subject)? else {
                continue;
            };
            let Ok(kind) = self.registry.get(&meta.kind) else {
                continue;
            };
            if kind
                .as_postable()
                .is_some_and(|p| p.membership_predicate() == triple.predicate)
            {
                return Iri::new(subject).map(Some);
            }
        }
        Ok(None)
    }

    /// Members of a container.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the container does not exist
    /// - `InvalidOperation` if the resource is not a container
    pub fn members(&self, container: &Iri) -> CoreResult<Vec<Iri>> {
        let version = self.version(container)?;
        if let Some((cached, members)) = self.members.lock().get(container) {
            if *cached == version {
                return Ok(members.clone());
            }
        }
        let members = self.read_members(container)?;
        self.members
            .lock()
            .insert(container.clone(), (version, members.clone()));
        Ok(members)
    }

    /// Refreshes the cached member list of `container`.
    pub(crate) fn index_members(&self, container: &Iri, version: u64) -> CoreResult<()> {
        let members = self.read_members(container)?;
        self.members
            .lock()
            .insert(container.clone(), (version, members));
        Ok(())
    }

    fn read_members(&self, container: &Iri) -> CoreResult<Vec<Iri>> {
        let fragment = self.backend.fragment(container.as_str())?;
        let kind = self.kind_of_fragment(container.as_str(), &fragment)?;
        let postable = kind.as_postable().ok_or_else(|| {
            CoreError::invalid_operation(format!("<{container}> is not a container"))
        })?;
        fragment
            .graph
            .objects(container.as_str(), postable.membership_predicate())
            .filter_map(|o| o.as_iri())
            .map(Iri::new)
            .collect()
    }

    /// Effective parameters of a computed trace: its method chain's merged
    /// parameters, overridden by the trace's own.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the method chain does not resolve.
    pub fn effective_parameters(&self, trace: &Iri) -> CoreResult<Parameters> {
        if let Some(parameters) = self.parameters.lock().get(trace) {
            return Ok(parameters.clone());
        }
        let chain = MethodChainResolver::new(self).resolve_for(trace)?;
        self.parameters
            .lock()
            .insert(trace.clone(), chain.parameters.clone());
        Ok(chain.parameters)
    }

    /// Drops cached effective parameters of `trace`, or of every trace.
    pub fn invalidate_parameters(&self, trace: Option<&Iri>) {
        let mut parameters = self.parameters.lock();
        match trace {
            Some(trace) => {
                parameters.remove(trace);
            }
            None => parameters.clear(),
        }
    }

    // =========================================================================
    // Conditional requests
    // =========================================================================

    /// Fails unless some tag of `if_match` strongly matches the resource.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if no tag matches.
    pub fn check_if_match(&self, uri: &Iri, if_match: &EntityTagSet) -> CoreResult<()> {
        let etag = self.etag(uri)?;
        if if_match.matches(&etag, Comparison::Strong) {
            Ok(())
        } else {
            Err(CoreError::ConcurrentModification {
                uri: uri.to_string(),
            })
        }
    }

    /// Fails if some tag of `if_none_match` weakly matches the resource.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if a tag matches.
    pub fn check_if_none_match(&self, uri: &Iri, if_none_match: &EntityTagSet) -> CoreResult<()> {
        let etag = self.etag(uri)?;
        if if_none_match.matches(&etag, Comparison::Weak) {
            Err(CoreError::ConcurrentModification {
                uri: uri.to_string(),
            })
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Begins an edit of `uri`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the resource does not exist
    /// - `InvalidOperation` if its kind refuses `mode`
    pub fn begin_edit(&self, uri: &Iri, mode: EditMode) -> CoreResult<EditTransaction<'_>> {
        let tx = EditTransaction::begin(self, uri, mode)?;
        match mode {
            EditMode::Internal => {}
            EditMode::Replace | EditMode::Append => {
                let editable = tx.kind().as_editable().ok_or_else(|| {
                    CoreError::invalid_operation(format!("<{uri}> cannot be edited"))
                })?;
                if mode == EditMode::Append && !editable.accepts_append() {
                    return Err(CoreError::invalid_operation(format!(
                        "<{uri}> does not accept append edits"
                    )));
                }
            }
        }
        Ok(tx)
    }

    /// Runs `body` in an edit transaction of `uri`, then commits.
    ///
    /// If `body` fails, nothing is committed and its error is returned.
    ///
    /// # Errors
    ///
    /// Returns the error of `body`, or any error of
    /// [`EditTransaction::commit`].
    pub fn edit<F>(&self, uri: &Iri, mode: EditMode, body: F) -> CoreResult<CommitReport>
    where
        F: FnOnce(&mut EditTransaction<'_>) -> CoreResult<()>,
    {
        let mut tx = self.begin_edit(uri, mode)?;
        match body(&mut tx) {
            Ok(()) => tx.commit(),
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Replaces the description of `uri` with `body`.
    ///
    /// Statements a replace edit cannot set are kept as they are.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `body` sets statements the kind does not
    /// allow, or if the result breaks the kind's contract.
    pub fn replace_state(&self, uri: &Iri, body: &Graph) -> CoreResult<CommitReport> {
        self.edit(uri, EditMode::Replace, |tx| {
            let staged = {
                let kind = tx.kind();
                let editable = kind.as_editable().ok_or_else(|| {
                    CoreError::invalid_operation(format!("<{uri}> cannot be edited"))
                })?;
                editable.prepare_replace(kind.contract(), uri.as_str(), tx.graph(), body)
            };
            *tx.graph_mut() = staged;
            Ok(())
        })
    }

    /// Adds the statements of `body` to `uri`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `body` adds statements the kind does not
    /// allow to append.
    pub fn append_state(&self, uri: &Iri, body: &Graph) -> CoreResult<CommitReport> {
        self.edit(uri, EditMode::Append, |tx| {
            tx.graph_mut().extend(body.iter().cloned());
            Ok(())
        })
    }

    /// Advances the version of `uri` and runs its commit acknowledgement,
    /// without changing any statement.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist.
    pub fn touch(&self, uri: &Iri) -> CoreResult<CommitReport> {
        self.edit(uri, EditMode::Internal, |tx| {
            tx.request_touch();
            Ok(())
        })
    }

    /// Creates a child of `container`.
    ///
    /// The child is named `slug` (or a random name) followed by its kind's
    /// suffix. Its initial transaction holds its type and the container's
    /// membership statement; `build` adds the rest. The container's lock is
    /// held throughout if the container is lock-protected.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the container refuses children of `rdf_type`
    /// - `InvalidIdentifier` if `slug` is not a single path segment
    /// - `AlreadyExists` if the child IRI is taken
    /// - `Busy` if the container lock is not obtained in time
    /// - `Validation` if the initial description breaks the child's contract
    pub fn post<F>(
        &self,
        container: &Iri,
        rdf_type: &str,
        slug: Option<&str>,
        build: F,
    ) -> CoreResult<Iri>
    where
        F: FnOnce(&mut EditTransaction<'_>) -> CoreResult<()>,
    {
        let container_kind = self.kind_of(container)?;
        let postable = container_kind.as_postable().ok_or_else(|| {
            CoreError::invalid_operation(format!("<{container}> does not accept children"))
        })?;
        if !postable.accepts_child(rdf_type) || !self.registry.contains(rdf_type) {
            return Err(CoreError::invalid_operation(format!(
                "<{container}> does not accept children of type <{rdf_type}>"
            )));
        }
        if !container.is_collection() {
            return Err(CoreError::invalid_operation(format!(
                "<{container}> is not a collection"
            )));
        }
        let kind = self.registry.get(rdf_type)?;

        let name = match slug {
            Some(slug) => {
                check_slug(slug)?;
                slug.to_string()
            }
            None => Uuid::new_v4().simple().to_string(),
        };
        let relative = format!("{name}{}", kind.uri_suffix());
        let child = Identifier::Relative(&relative).resolve(container)?;

        let _lock = if container_kind.contract().lock_protected {
            Some(self.lock(container)?)
        } else {
            None
        };

        let mut tx = EditTransaction::create(self, &child, kind)?;
        tx.insert(Triple::new(
            Term::iri(container.as_str()),
            postable.membership_predicate(),
            Term::iri(child.as_str()),
        ));
        if let Err(e) = build(&mut tx) {
            tx.rollback();
            return Err(e);
        }
        tx.commit()?;

        if let Err(e) = self.touch(container) {
            warn!(
                container = %container,
                child = %child,
                error = %e,
                "membership update failed, removing child"
            );
            if let Err(undo) = self.remove_resource(&child) {
                error!(child = %child, error = %undo, "failed to remove orphan child");
            }
            return Err(e);
        }

        info!(container = %container, child = %child, kind = rdf_type, "resource created");
        Ok(child)
    }

    /// Deletes `uri` and its membership in its container.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if the kind cannot be deleted, refuses deletion
    ///   in its current state, or other resources still reference it
    /// - `Busy` if the container lock is not obtained in time
    pub fn delete(&self, uri: &Iri) -> CoreResult<()> {
        let kind = self.kind_of(uri)?;
        let deletable = kind.as_deletable().ok_or_else(|| {
            CoreError::invalid_operation(format!("<{uri}> cannot be deleted"))
        })?;

        let container = self.container_of(uri)?;
        let container_kind = container.as_ref().map(|c| self.kind_of(c)).transpose()?;
        let _lock = match (&container, &container_kind) {
            (Some(c), Some(k)) if k.contract().lock_protected => Some(self.lock(c)?),
            _ => None,
        };

        // Re-read under the lock.
        let fragment = self.backend.fragment(uri.as_str())?;
        if !fragment.exists() {
            return Err(CoreError::not_found(uri.as_str()));
        }
        deletable.check_delete(uri.as_str(), &fragment.graph)?;

        let membership = container_kind
            .as_ref()
            .and_then(|k| k.as_postable())
            .map(|p| p.membership_predicate().to_string());
        let referrer = fragment.graph.iter().find(|t| {
            let is_membership = container
                .as_ref()
                .is_some_and(|c| t.subject.is_iri(c.as_str()))
                && membership.as_deref() == Some(t.predicate.as_str());
            !t.subject.is_iri(uri.as_str()) && !is_membership
        });
        if let Some(triple) = referrer {
            return Err(CoreError::invalid_operation(format!(
                "<{uri}> is still referenced by {}",
                triple.subject
            )));
        }

        self.remove_resource(uri)?;
        self.members.lock().remove(uri);
        self.invalidate_parameters(None);
        if let Some(container) = &container {
            if let Err(e) = self.touch(container) {
                warn!(
                    container = %container,
                    uri = %uri,
                    error = %e,
                    "membership update failed, restoring resource"
                );
                if let Err(undo) = self.restore_resource(uri, fragment) {
                    error!(uri = %uri, error = %undo, "failed to restore deleted resource");
                }
                return Err(e);
            }
        }

        info!(uri = %uri, "resource deleted");
        Ok(())
    }

    fn remove_resource(&self, uri: &Iri) -> CoreResult<()> {
        let mut guard = self.backend.write()?;
        let current = guard.fragment(uri.as_str())?;
        guard.apply(
            uri.as_str(),
            FragmentUpdate {
                added: Graph::new(),
                removed: current.graph,
                meta: MetaUpdate::Remove,
            },
        )?;
        guard.commit()?;
        Ok(())
    }

    fn restore_resource(&self, uri: &Iri, fragment: Fragment) -> CoreResult<()> {
        let meta = fragment
            .meta
            .ok_or_else(|| CoreError::not_found(uri.as_str()))?;
        let mut guard = self.backend.write()?;
        guard.apply(
            uri.as_str(),
            FragmentUpdate {
                added: fragment.graph,
                removed: Graph::new(),
                meta: MetaUpdate::Set(meta),
            },
        )?;
        guard.commit()?;
        Ok(())
    }
}

/// A slug must be one non-empty path segment.
fn check_slug(slug: &str) -> CoreResult<()> {
    let valid = !slug.is_empty()
        && slug != "."
        && slug != ".."
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_identifier(format!(
            "invalid slug {slug:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockTimeout;
    use crate::vocab::{builtin, RDFS_LABEL};

    fn create_store() -> Store {
        Store::in_memory(
            Config::new(LockTimeout::IMMEDIATE),
            Registry::with_trace_kinds(),
        )
        .unwrap()
    }

    fn create_base(store: &Store, slug: &str) -> Iri {
        store
            .post(store.root(), ktbs::BASE, Some(slug), |_| Ok(()))
            .unwrap()
    }

    fn create_trace(store: &Store, base: &Iri, slug: &str) -> Iri {
        store
            .post(base, ktbs::STORED_TRACE, Some(slug), |tx| {
                tx.add(ktbs::HAS_ORIGIN, Term::literal("origin"));
                Ok(())
            })
            .unwrap()
    }

    #[test]
    fn root_is_bootstrapped() {
        let store = create_store();
        let kind = store.kind_of(store.root()).unwrap();
        assert_eq!(kind.rdf_type(), ktbs::KTBS_ROOT);
        assert_eq!(store.version(store.root()).unwrap(), 1);
        assert!(store.members(store.root()).unwrap().is_empty());
    }

    #[test]
    fn file_locks_need_a_directory() {
        let config = Config::new(LockTimeout::IMMEDIATE).lock_backend(LockBackend::File);
        let err = Store::in_memory(config, Registry::with_trace_kinds()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn post_creates_member() {
        let store = create_store();
        let base = create_base(&store, "b1");
        assert_eq!(base.as_str(), "http://localhost:8001/b1/");
        assert_eq!(store.members(store.root()).unwrap(), vec![base.clone()]);
        assert_eq!(store.container_of(&base).unwrap().as_ref(), Some(store.root()));
        assert_eq!(store.version(store.root()).unwrap(), 2);

        let trace = create_trace(&store, &base, "t1");
        assert_eq!(trace.as_str(), "http://localhost:8001/b1/t1/");
        assert_eq!(store.members(&base).unwrap(), vec![trace]);
    }

    #[test]
    fn post_without_slug_generates_name() {
        let store = create_store();
        let base = store
            .post(store.root(), ktbs::BASE, None, |_| Ok(()))
            .unwrap();
        assert!(base.is_collection());
        assert!(base.as_str().starts_with(store.root().as_str()));
    }

    #[test]
    fn post_rejects_wrong_child_type() {
        let store = create_store();
        let err = store
            .post(store.root(), ktbs::METHOD, Some("m"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));

        let err = store
            .post(store.root(), ktbs::BASE, Some("a/b"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidIdentifier { .. }));
    }

    #[test]
    fn post_twice_fails() {
        let store = create_store();
        create_base(&store, "b1");
        let err = store
            .post(store.root(), ktbs::BASE, Some("b1"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
        assert_eq!(store.members(store.root()).unwrap().len(), 1);
    }

    #[test]
    fn invalid_child_is_not_created() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let version = store.version(&base).unwrap();

        // No origin.
        let err = store
            .post(&base, ktbs::STORED_TRACE, Some("t1"), |_| Ok(()))
            .unwrap_err();
        assert!(err.diagnosis().unwrap().mentions(ktbs::HAS_ORIGIN));
        assert!(!store.exists(&store.resolve("b1/t1/").unwrap()).unwrap());
        assert_eq!(store.version(&base).unwrap(), version);
        assert!(store.members(&base).unwrap().is_empty());
    }

    #[test]
    fn get_state_without_incoming() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let all = store.get_state(&base, StateParams::default()).unwrap();
        let out = store
            .get_state(&base, StateParams { incoming: false })
            .unwrap();
        assert_eq!(all.len(), out.len() + 1);
        assert!(out.iter().all(|t| t.subject.is_iri(base.as_str())));
    }

    #[test]
    fn replace_keeps_membership() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let body: Graph = [Triple::new(
            Term::iri(base.as_str()),
            RDFS_LABEL,
            Term::literal("first"),
        )]
        .into_iter()
        .collect();
        store.replace_state(&base, &body).unwrap();

        let state = store.get_state(&base, StateParams::default()).unwrap();
        assert_eq!(state.object(base.as_str(), RDFS_LABEL), Some(&Term::literal("first")));
        assert_eq!(store.container_of(&base).unwrap().as_ref(), Some(store.root()));

        let body: Graph = [Triple::new(
            Term::iri(base.as_str()),
            RDFS_LABEL,
            Term::literal("second"),
        )]
        .into_iter()
        .collect();
        store.replace_state(&base, &body).unwrap();
        let state = store.get_state(&base, StateParams::default()).unwrap();
        assert_eq!(state.count_out(base.as_str(), RDFS_LABEL), 1);
    }

    #[test]
    fn replace_rejects_non_whitelisted() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let etag = store.etag(&base).unwrap();
        let body: Graph = [Triple::new(
            Term::iri(base.as_str()),
            "http://ex.org/other",
            Term::literal("x"),
        )]
        .into_iter()
        .collect();
        let err = store.replace_state(&base, &body).unwrap_err();
        assert!(err.diagnosis().unwrap().mentions("http://ex.org/other"));
        assert_eq!(store.etag(&base).unwrap(), etag);
    }

    #[test]
    fn append_rejects_removal_and_foreign_predicates() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let label = Triple::new(Term::iri(base.as_str()), RDFS_LABEL, Term::literal("l"));
        store
            .append_state(&base, &[label.clone()].into_iter().collect())
            .unwrap();

        let err = store
            .edit(&base, EditMode::Append, |tx| {
                tx.remove(&label);
                Ok(())
            })
            .unwrap_err();
        assert!(err.diagnosis().unwrap().mentions("cannot remove"));
    }

    #[test]
    fn touch_advances_version_not_etag() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let etag = store.etag(&base).unwrap();
        let version = store.version(&base).unwrap();

        let report = store.touch(&base).unwrap();
        assert!(!report.changed);
        assert_eq!(report.version, version + 1);
        assert_eq!(store.etag(&base).unwrap(), etag);
    }

    #[test]
    fn no_op_edit_keeps_version() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let version = store.version(&base).unwrap();
        let report = store.edit(&base, EditMode::Internal, |_| Ok(())).unwrap();
        assert!(!report.changed);
        assert_eq!(store.version(&base).unwrap(), version);
    }

    #[test]
    fn body_error_rolls_back() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let etag = store.etag(&base).unwrap();

        let err = store
            .edit(&base, EditMode::Append, |tx| {
                tx.add(RDFS_LABEL, Term::literal("never"));
                Err(CoreError::invalid_operation("abort"))
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert_eq!(store.etag(&base).unwrap(), etag);
    }

    #[test]
    fn dropped_transaction_commits_nothing() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let version = store.version(&base).unwrap();
        {
            let mut tx = store.begin_edit(&base, EditMode::Append).unwrap();
            tx.add(RDFS_LABEL, Term::literal("dropped"));
        }
        assert_eq!(store.version(&base).unwrap(), version);
        let state = store.get_state(&base, StateParams::default()).unwrap();
        assert_eq!(state.count_out(base.as_str(), RDFS_LABEL), 0);
    }

    #[test]
    fn delete_rules() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let trace = create_trace(&store, &base, "t1");

        // Root cannot be deleted, a non-empty base cannot be deleted.
        assert!(store.delete(store.root()).is_err());
        assert!(matches!(
            store.delete(&base).unwrap_err(),
            CoreError::InvalidOperation { .. }
        ));

        // A referenced trace cannot be deleted.
        let computed = store
            .post(&base, ktbs::COMPUTED_TRACE, Some("c1"), |tx| {
                tx.add(ktbs::HAS_SOURCE, Term::iri(trace.as_str()));
                tx.add(ktbs::HAS_METHOD, Term::iri(builtin::FILTER));
                Ok(())
            })
            .unwrap();
        assert!(store.delete(&trace).is_err());

        store.delete(&computed).unwrap();
        store.delete(&trace).unwrap();
        assert!(!store.exists(&trace).unwrap());
        assert!(store.members(&base).unwrap().is_empty());

        store.delete(&base).unwrap();
        assert!(store.members(store.root()).unwrap().is_empty());
        assert!(matches!(
            store.delete(&base).unwrap_err(),
            CoreError::NotFound { .. }
        ));
    }

    #[test]
    fn conditional_checks() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let etag = store.etag(&base).unwrap();

        let current = EntityTagSet::parse(&etag.to_string()).unwrap();
        let weak = EntityTagSet::parse(&format!("W/\"{}\"", etag.opaque())).unwrap();
        let other = EntityTagSet::parse("\"other\"").unwrap();

        store.check_if_match(&base, &current).unwrap();
        store.check_if_match(&base, &EntityTagSet::Any).unwrap();
        assert!(matches!(
            store.check_if_match(&base, &weak).unwrap_err(),
            CoreError::ConcurrentModification { .. }
        ));
        assert!(store.check_if_match(&base, &other).is_err());

        store.check_if_none_match(&base, &other).unwrap();
        assert!(store.check_if_none_match(&base, &weak).is_err());
        assert!(store.check_if_none_match(&base, &EntityTagSet::Any).is_err());
    }

    #[test]
    fn held_container_lock_makes_post_busy() {
        let store = create_store();
        let base = create_base(&store, "b1");
        let guard = store.lock(&base).unwrap();

        let err = store
            .post(&base, ktbs::METHOD, Some("m"), |tx| {
                tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::Busy { .. }));

        drop(guard);
        store
            .post(&base, ktbs::METHOD, Some("m"), |tx| {
                tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn corrupted_type_is_reported() {
        let store = create_store();
        let uri = Iri::new("http://localhost:8001/ghost").unwrap();
        {
            let mut guard = store.backend().write().unwrap();
            guard
                .apply(
                    uri.as_str(),
                    FragmentUpdate {
                        added: [Triple::new(
                            Term::iri(uri.as_str()),
                            RDF_TYPE,
                            Term::iri("http://ex.org/Unknown"),
                        )]
                        .into_iter()
                        .collect(),
                        removed: Graph::new(),
                        meta: MetaUpdate::Set(tracekb_storage::ResourceMeta {
                            kind: "http://ex.org/Unknown".to_string(),
                            version: 1,
                        }),
                    },
                )
                .unwrap();
            guard.commit().unwrap();
        }
        let err = store.get_state(&uri, StateParams::default()).unwrap_err();
        assert!(matches!(err, CoreError::CorruptedStore { .. }));
    }
}
