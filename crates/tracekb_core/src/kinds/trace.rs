//! Trace kinds.

use super::{check_parameters, check_references};
use crate::contract::{Cardinality, CheckContext, TypeContract};
use crate::error::{CoreError, CoreResult, Diagnosis};
use crate::identifier::Iri;
use crate::kind::{CommitInfo, Deletable, Editable, ResourceKind};
use crate::method_chain::MethodChainResolver;
use crate::store::Store;
use crate::vocab::{ktbs, RDFS_LABEL};

/// A trace whose obsels are stored as posted.
#[derive(Debug)]
pub struct StoredTrace {
    contract: TypeContract,
}

impl StoredTrace {
    /// Creates the stored trace kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: TypeContract::new(ktbs::STORED_TRACE)
                .outgoing(Cardinality::exactly(ktbs::HAS_ORIGIN, 1))
                .outgoing(Cardinality::optional(ktbs::HAS_MODEL))
                .incoming(Cardinality::exactly(ktbs::CONTAINS, 1))
                .replaceable_out([RDFS_LABEL, ktbs::HAS_ORIGIN, ktbs::HAS_MODEL])
                .appendable_out([RDFS_LABEL]),
        }
    }
}

impl Default for StoredTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for StoredTrace {
    fn contract(&self) -> &TypeContract {
        &self.contract
    }

    fn check(&self, ctx: &CheckContext<'_>, diagnosis: &mut Diagnosis) {
        check_references(ctx.uri, ctx.graph, ktbs::HAS_MODEL, diagnosis);
    }

    fn uri_suffix(&self) -> &'static str {
        "/"
    }

    fn as_editable(&self) -> Option<&dyn Editable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

impl Editable for StoredTrace {}

impl Deletable for StoredTrace {}

/// A trace derived from source traces by a method.
#[derive(Debug)]
pub struct ComputedTrace {
    contract: TypeContract,
}

impl ComputedTrace {
    /// Creates the computed trace kind.
    #[must_use]
    pub fn new() -> Self {
        Self {
            contract: TypeContract::new(ktbs::COMPUTED_TRACE)
                .outgoing(Cardinality::at_least(ktbs::HAS_SOURCE, 1))
                .outgoing(Cardinality::exactly(ktbs::HAS_METHOD, 1))
                .incoming(Cardinality::exactly(ktbs::CONTAINS, 1))
                .replaceable_out([
                    RDFS_LABEL,
                    ktbs::HAS_SOURCE,
                    ktbs::HAS_METHOD,
                    ktbs::HAS_PARAMETER,
                ])
                .appendable_out([RDFS_LABEL, ktbs::HAS_PARAMETER]),
        }
    }

    /// Sources must be traces of the trace's own base.
    fn check_sources(store: &Store, trace: &Iri) -> CoreResult<()> {
        let base = store.container_of(trace)?;
        let graph = store.backend().fragment(trace.as_str())?.graph;
        for source in graph.objects(trace.as_str(), ktbs::HAS_SOURCE) {
            let Some(source) = source.as_iri() else {
                continue;
            };
            let source = Iri::new(source)?;
            match store.backend().meta(source.as_str())? {
                Some(meta)
                    if meta.kind == ktbs::STORED_TRACE || meta.kind == ktbs::COMPUTED_TRACE => {}
                Some(meta) => {
                    return Err(CoreError::configuration(format!(
                        "source <{source}> of <{trace}> is a <{}>, not a trace",
                        meta.kind
                    )))
                }
                None => {
                    return Err(CoreError::configuration(format!(
                        "source <{source}> of <{trace}> does not exist"
                    )))
                }
            }
            if store.container_of(&source)? != base {
                return Err(CoreError::configuration(format!(
                    "source <{source}> is not in the base of <{trace}>"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ComputedTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceKind for ComputedTrace {
    fn contract(&self) -> &TypeContract {
        &self.contract
    }

    fn check(&self, ctx: &CheckContext<'_>, diagnosis: &mut Diagnosis) {
        check_references(ctx.uri, ctx.graph, ktbs::HAS_SOURCE, diagnosis);
        check_references(ctx.uri, ctx.graph, ktbs::HAS_METHOD, diagnosis);
        check_parameters(ctx.uri, ctx.graph, diagnosis);
    }

    fn on_commit(&self, store: &Store, commit: &CommitInfo) -> CoreResult<()> {
        Self::check_sources(store, &commit.uri)?;
        MethodChainResolver::new(store).resolve_for(&commit.uri)?;
        store.invalidate_parameters(Some(&commit.uri));
        Ok(())
    }

    fn uri_suffix(&self) -> &'static str {
        "/"
    }

    fn as_editable(&self) -> Option<&dyn Editable> {
        Some(self)
    }

    fn as_deletable(&self) -> Option<&dyn Deletable> {
        Some(self)
    }
}

impl Editable for ComputedTrace {}

impl Deletable for ComputedTrace {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::EditMode;
    use crate::vocab::{builtin, RDF_TYPE};
    use tracekb_storage::{Graph, Term, Triple};

    const T: &str = "http://host/b/t/";

    fn check(kind: &dyn ResourceKind, graph: &Graph) -> Diagnosis {
        let empty = Graph::new();
        let ctx = CheckContext {
            uri: T,
            graph,
            added: &empty,
            removed: &empty,
            mode: EditMode::Internal,
        };
        let mut d = Diagnosis::new();
        kind.contract().check(&ctx, &mut d);
        kind.check(&ctx, &mut d);
        d
    }

    fn contained(rdf_type: &str) -> Graph {
        [
            Triple::new(Term::iri(T), RDF_TYPE, Term::iri(rdf_type)),
            Triple::new(Term::iri("http://host/b/"), ktbs::CONTAINS, Term::iri(T)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn stored_trace_needs_one_origin() {
        let kind = StoredTrace::new();
        let mut g = contained(ktbs::STORED_TRACE);
        let d = check(&kind, &g);
        assert!(d.mentions(ktbs::HAS_ORIGIN), "{d}");

        g.insert(Triple::new(
            Term::iri(T),
            ktbs::HAS_ORIGIN,
            Term::literal("1970-01-01T00:00:00Z"),
        ));
        assert!(check(&kind, &g).is_valid());
    }

    #[test]
    fn computed_trace_contract() {
        let kind = ComputedTrace::new();
        let mut g = contained(ktbs::COMPUTED_TRACE);
        let d = check(&kind, &g);
        assert!(d.mentions(ktbs::HAS_SOURCE), "{d}");
        assert!(d.mentions(ktbs::HAS_METHOD), "{d}");

        g.insert(Triple::new(Term::iri(T), ktbs::HAS_SOURCE, Term::iri("http://host/b/s/")));
        g.insert(Triple::new(Term::iri(T), ktbs::HAS_METHOD, Term::iri(builtin::FILTER)));
        g.insert(Triple::new(Term::iri(T), ktbs::HAS_PARAMETER, Term::literal("after=10")));
        assert!(check(&kind, &g).is_valid());

        g.insert(Triple::new(Term::iri(T), ktbs::HAS_SOURCE, Term::literal("nope")));
        assert!(check(&kind, &g).mentions("must be an IRI"));
    }
}
