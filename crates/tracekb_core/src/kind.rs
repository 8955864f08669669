//! Resource kinds and their capabilities.
//!
//! Every resource type is handled by a [`ResourceKind`]. What a kind can do
//! beyond being read is declared through independent capability traits,
//! exposed by the `as_*` accessors; the store dispatches on which
//! capabilities are present.

use crate::contract::{CheckContext, EditMode, TypeContract};
use crate::error::{CoreResult, Diagnosis};
use crate::identifier::Iri;
use crate::store::Store;
use crate::vocab::RDF_TYPE;
use std::fmt;
use tracekb_storage::Graph;

/// What a commit changed, handed to [`ResourceKind::on_commit`].
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The committed resource.
    pub uri: Iri,
    /// Version after the commit.
    pub version: u64,
    /// Statements added.
    pub added: Graph,
    /// Statements removed.
    pub removed: Graph,
    /// True for the initial commit of a new resource.
    pub created: bool,
    /// How the edit was requested.
    pub mode: EditMode,
}

/// Behavior of one resource type.
pub trait ResourceKind: Send + Sync + fmt::Debug {
    /// The structural contract of this type.
    fn contract(&self) -> &TypeContract;

    /// The type IRI.
    fn rdf_type(&self) -> &str {
        &self.contract().rdf_type
    }

    /// Type-specific checks, run after the generic contract checks.
    fn check(&self, _ctx: &CheckContext<'_>, _diagnosis: &mut Diagnosis) {}

    /// Commit acknowledgement.
    ///
    /// Called after the store has applied a commit. An error rolls the
    /// commit back and is returned to the editor, unless another commit of
    /// the same resource landed first: the store is then left as is and
    /// the editor gets `ConcurrentModification`.
    ///
    /// # Errors
    ///
    /// Whatever the kind considers a failed commit.
    fn on_commit(&self, _store: &Store, _commit: &CommitInfo) -> CoreResult<()> {
        Ok(())
    }

    /// Appended to generated child identifiers (`"/"` for collection-like
    /// resources).
    fn uri_suffix(&self) -> &'static str {
        ""
    }

    /// The replace/append edit capability.
    fn as_editable(&self) -> Option<&dyn Editable> {
        None
    }

    /// The child creation capability.
    fn as_postable(&self) -> Option<&dyn Postable> {
        None
    }

    /// The deletion capability.
    fn as_deletable(&self) -> Option<&dyn Deletable> {
        None
    }
}

/// Resources whose description callers may replace or extend.
pub trait Editable {
    /// Builds the statement set a replace edit would commit.
    ///
    /// Statements a replace edit may not touch (membership, references from
    /// other resources, the declared type) are kept from `current`; every
    /// replaceable statement is taken from `body`.
    fn prepare_replace(
        &self,
        contract: &TypeContract,
        uri: &str,
        current: &Graph,
        body: &Graph,
    ) -> Graph {
        let mut staged = current.clone();
        staged.retain(|t| {
            if t.subject.is_iri(uri) {
                if t.predicate == RDF_TYPE {
                    t.object.is_iri(&contract.rdf_type)
                } else {
                    !contract.replaceable_out.contains(&t.predicate)
                }
            } else {
                !contract.replaceable_in.contains(&t.predicate)
            }
        });
        staged.extend(body.iter().cloned());
        staged
    }

    /// Whether append edits are accepted.
    fn accepts_append(&self) -> bool {
        true
    }
}

/// Containers that create children.
pub trait Postable {
    /// Predicate linking the container to each member.
    fn membership_predicate(&self) -> &str;

    /// Whether a child of type `rdf_type` may be created here.
    fn accepts_child(&self, rdf_type: &str) -> bool;
}

/// Resources that may be deleted.
pub trait Deletable {
    /// Refuses deletion of a resource in its current state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the resource may not be deleted now.
    fn check_delete(&self, _uri: &str, _fragment: &Graph) -> CoreResult<()> {
        Ok(())
    }
}
