//! User-defined methods.

use super::{check_parameters, check_references};
use crate::contract::{Cardinality, CheckContext, TypeContract};
use crate::error::{CoreResult, Diagnosis};
use crate::kind::{CommitInfo, Deletable, Editable, ResourceKind};
use crate::method_chain::MethodChainResolver;
use crate::store::Store;
use crate::vocab::{ktbs, RDFS_LABEL};

/// A method inheriting from a parent method and overriding some of its
/// parameters.
#[derive(Debug)]
pub struct Method {
    contract: TypeContract,
}

impl Method {
    /// Creates the method kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: TypeContract::new(ktbs::METHOD)
                .outgoing(Cardinality::exactly(ktbs::HAS_PARENT_METHOD, 1))
                .incoming(Cardinality::exactly(ktbs::CONTAINS, 1))
                .replaceable_out([RDFS_LABEL, ktbs::HAS_PARENT_METHOD, ktbs::HAS_PARAMETER])
                .appendable_out([RDFS_LABEL, ktbs::HAS_PARAMETER]),
        }
    }
}

impl Default for Method {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for Method {
    fn contract(&self) -> &TypeContract {
        &self.contract
    }

    fn check(&self, ctx: &CheckContext<'_>, diagnosis: &mut Diagnosis) {
        check_references(ctx.uri, ctx.graph, ktbs::HAS_PARENT_METHOD, diagnosis);
        check_parameters(ctx.uri, ctx.graph, diagnosis);
    }

    /// Re-resolves the chain, so that an edit closing a loop or pointing
    /// outside the base is rolled back. Any computed trace may depend on
    /// this method, so every cached parameter set is dropped.
    fn on_commit(&self, store: &Store, commit: &CommitInfo) -> CoreResult<()> {
        MethodChainResolver::new(store).resolve(&commit.uri)?;
        store.invalidate_parameters(None);
        Ok(())
    }

    fn as_editable(&self) -> Option<&dyn Editable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

impl Editable for Method {}

impl Deletable for Method {}
