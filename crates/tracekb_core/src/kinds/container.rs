//! Container kinds.

use crate::contract::{Cardinality, TypeContract};
use crate::error::{CoreError, CoreResult};
use crate::kind::{CommitInfo, Deletable, Editable, Postable, ResourceKind};
use crate::store::Store;
use crate::vocab::{ktbs, RDFS_LABEL};
use tracekb_storage::Graph;

/// The store's root container; holds bases.
#[derive(Debug)]
pub struct Root {
    contract: TypeContract,
}

impl Root {
    /// Creates the root kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: TypeContract::new(ktbs::KTBS_ROOT)
                .replaceable_out([RDFS_LABEL])
                .appendable_out([RDFS_LABEL])
                .lock_protected(),
        }
    }
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for Root {
    fn contract(&self) -> &TypeContract {
        &self.contract
    }

    fn on_commit(&self, store: &Store, commit: &CommitInfo) -> CoreResult<()> {
        store.index_members(&commit.uri, commit.version)
    }

    fn uri_suffix(&self) -> &'static str {
        "/"
    }

    fn as_editable(&self) -> Option<&dyn Editable> {
        Some(self)
    }

    fn as_postable(&self) -> Option<&dyn Postable> {
        Some(self)
    }
}

impl Editable for Root {}

impl Postable for Root {
    fn membership_predicate(&self) -> &str {
        ktbs::HAS_BASE
    }

    fn accepts_child(&self, rdf_type: &str) -> bool {
        rdf_type == ktbs::BASE
    }
}

/// A trace base; holds traces and methods.
#[derive(Debug)]
pub struct Base {
    contract: TypeContract,
}

impl Base {
    /// Creates the base kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: TypeContract::new(ktbs::BASE)
                .incoming(Cardinality::exactly(ktbs::HAS_BASE, 1))
                .replaceable_out([RDFS_LABEL])
                .appendable_out([RDFS_LABEL])
                .lock_protected(),
        }
    }
}

impl Default for Base {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for Base {
    fn contract(&self) -> &TypeContract {
        &self.contract
    }

    fn on_commit(&self, store: &Store, commit: &CommitInfo) -> CoreResult<()> {
        store.index_members(&commit.uri, commit.version)
    }

    fn uri_suffix(&self) -> &'static str {
        "/"
    }

    fn as_editable(&self) -> Option<&dyn Editable> {
        Some(self)
    }

    fn as_postable(&self) -> Option<&dyn Postable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

impl Editable for Base {}

impl Postable for Base {
    fn membership_predicate(&self) -> &str {
        ktbs::CONTAINS
    }

    fn accepts_child(&self, rdf_type: &str) -> bool {
        matches!(
            rdf_type,
            ktbs::STORED_TRACE | ktbs::COMPUTED_TRACE | ktbs::METHOD
        )
    }
}

impl Deletable for Base {
    fn check_delete(&self, uri: &str, fragment: &Graph) -> CoreResult<()> {
        let members = fragment.count_out(uri, ktbs::CONTAINS);
        if members > 0 {
            return Err(CoreError::invalid_operation(format!(
                "base <{uri}> still contains {members} resource(s)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracekb_storage::{Term, Triple};

    #[test]
    fn containers_are_lock_protected() {
        assert!(Root::new().contract().lock_protected);
        assert!(Base::new().contract().lock_protected);
        assert!(Root::new().as_deletable().is_none());
    }

    #[test]
    fn membership() {
        let root = Root::new();
        let postable = root.as_postable().unwrap();
        assert_eq!(postable.membership_predicate(), ktbs::HAS_BASE);
        assert!(postable.accepts_child(ktbs::BASE));
        assert!(!postable.accepts_child(ktbs::METHOD));

        let base = Base::new();
        let postable = base.as_postable().unwrap();
        assert!(postable.accepts_child(ktbs::METHOD));
        assert!(!postable.accepts_child(ktbs::BASE));
    }

    #[test]
    fn non_empty_base_cannot_be_deleted() {
        let uri = "http://host/b/";
        let base = Base::new();
        let deletable = base.as_deletable().unwrap();
        assert!(deletable.check_delete(uri, &Graph::new()).is_ok());

        let g: Graph = [Triple::new(
            Term::iri(uri),
            ktbs::CONTAINS,
            Term::iri("http://host/b/t/"),
        )]
        .into_iter()
        .collect();
        let err = deletable.check_delete(uri, &g).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }
}
