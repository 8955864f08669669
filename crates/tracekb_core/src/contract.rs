//! Structural contracts of resource types.
//!
//! A [`TypeContract`] declares, for one resource type:
//! - cardinality constraints on outgoing statements (resource as subject)
//!   and incoming statements (resource as object), checked independently
//! - which predicates a replace edit and an append edit may set
//! - which extra `rdf:type` values may be asserted
//!
//! Checks always run against the post-edit statement set.

use crate::error::Diagnosis;
use crate::vocab::RDF_TYPE;
use std::collections::BTreeSet;
use std::fmt;
use tracekb_storage::{Graph, Term, Triple};

/// How an edit was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Performed by the store itself (creation, bookkeeping). No whitelist.
    Internal,
    /// Replaces the resource's description. Replace whitelists apply.
    Replace,
    /// Adds statements only. Append whitelists apply.
    Append,
}

/// A bound on how many statements with a given predicate a resource has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cardinality {
    /// Predicate IRI.
    pub predicate: String,
    /// Minimum count.
    pub min: usize,
    /// Maximum count, `None` for unbounded.
    pub max: Option<usize>,
}

impl Cardinality {
    /// Between `min` and `max` statements.
    pub fn new(predicate: impl Into<String>, min: usize, max: Option<usize>) -> Self {
        Self {
            predicate: predicate.into(),
            min,
            max,
        }
    }

    /// Exactly `n` statements.
    pub fn exactly(predicate: impl Into<String>, n: usize) -> Self {
        Self::new(predicate, n, Some(n))
    }

    /// At least `min` statements.
    pub fn at_least(predicate: impl Into<String>, min: usize) -> Self {
        Self::new(predicate, min, None)
    }

    /// Zero or one statement.
    pub fn optional(predicate: impl Into<String>) -> Self {
        Self::new(predicate, 0, Some(1))
    }

    fn check(&self, count: usize, uri: &str, role: Role, diagnosis: &mut Diagnosis) {
        if count < self.min {
            diagnosis.push(format!(
                "<{uri}> has {count} {role} <{}> statement(s), expected at least {}",
                self.predicate, self.min
            ));
        }
        if let Some(max) = self.max {
            if count > max {
                diagnosis.push(format!(
                    "<{uri}> has {count} {role} <{}> statement(s), expected at most {max}",
                    self.predicate
                ));
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Role {
    Outgoing,
    Incoming,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        })
    }
}

/// The declared structural capabilities of a resource type.
#[derive(Debug, Clone, Default)]
pub struct TypeContract {
    /// The type IRI.
    pub rdf_type: String,
    /// Constraints on statements with the resource as subject.
    pub cardinality_out: Vec<Cardinality>,
    /// Constraints on statements with the resource as object.
    pub cardinality_in: Vec<Cardinality>,
    /// Outgoing predicates a replace edit may add or remove.
    pub replaceable_out: BTreeSet<String>,
    /// Incoming predicates a replace edit may add or remove.
    pub replaceable_in: BTreeSet<String>,
    /// Outgoing predicates an append edit may add.
    pub appendable_out: BTreeSet<String>,
    /// Incoming predicates an append edit may add.
    pub appendable_in: BTreeSet<String>,
    /// Extra types an edit may assert with `rdf:type`.
    pub allowed_types: BTreeSet<String>,
    /// Whether editing membership of this resource takes its lock.
    pub lock_protected: bool,
}

/// Everything a check needs to know about an edit.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// The edited resource.
    pub uri: &'a str,
    /// The statement set that will be committed.
    pub graph: &'a Graph,
    /// Statements the edit adds.
    pub added: &'a Graph,
    /// Statements the edit removes.
    pub removed: &'a Graph,
    /// How the edit was requested.
    pub mode: EditMode,
}

impl TypeContract {
    /// Creates an empty contract for `rdf_type`.
    pub fn new(rdf_type: impl Into<String>) -> Self {
        Self {
            rdf_type: rdf_type.into(),
            ..Self::default()
        }
    }

    /// Adds an outgoing cardinality constraint.
    #[must_use]
    pub fn outgoing(mut self, cardinality: Cardinality) -> Self {
        self.cardinality_out.push(cardinality);
        self
    }

    /// Adds an incoming cardinality constraint.
    #[must_use]
    pub fn incoming(mut self, cardinality: Cardinality) -> Self {
        self.cardinality_in.push(cardinality);
        self
    }

    /// Lets replace edits set these outgoing predicates.
    #[must_use]
    pub fn replaceable_out<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replaceable_out
            .extend(predicates.into_iter().map(Into::into));
        self
    }

    /// Lets replace edits set these incoming predicates.
    #[must_use]
    pub fn replaceable_in<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replaceable_in
            .extend(predicates.into_iter().map(Into::into));
        self
    }

    /// Lets append edits add these outgoing predicates.
    #[must_use]
    pub fn appendable_out<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.appendable_out
            .extend(predicates.into_iter().map(Into::into));
        self
    }

    /// Lets append edits add these incoming predicates.
    #[must_use]
    pub fn appendable_in<I, S>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.appendable_in
            .extend(predicates.into_iter().map(Into::into));
        self
    }

    /// Lets edits assert these extra types.
    #[must_use]
    pub fn allowed_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Marks the type as a lock-protected container.
    #[must_use]
    pub fn lock_protected(mut self) -> Self {
        self.lock_protected = true;
        self
    }

    /// Runs the generic checks, appending failures to `diagnosis`.
    pub fn check(&self, ctx: &CheckContext<'_>, diagnosis: &mut Diagnosis) {
        let uri = ctx.uri;

        for triple in ctx.graph.iter().filter(|t| !t.involves(uri)) {
            diagnosis.push(format!("statement {triple} does not involve <{uri}>"));
        }

        let declared = Triple::new(Term::iri(uri), RDF_TYPE, Term::iri(&self.rdf_type));
        if !ctx.graph.contains(&declared) {
            diagnosis.push(format!(
                "<{uri}> must keep its declared type <{}>",
                self.rdf_type
            ));
        }

        for card in &self.cardinality_out {
            card.check(
                ctx.graph.count_out(uri, &card.predicate),
                uri,
                Role::Outgoing,
                diagnosis,
            );
        }
        for card in &self.cardinality_in {
            card.check(
                ctx.graph.count_in(uri, &card.predicate),
                uri,
                Role::Incoming,
                diagnosis,
            );
        }

        match ctx.mode {
            EditMode::Internal => {}
            EditMode::Replace => {
                for triple in ctx.added {
                    self.check_whitelisted(
                        triple,
                        uri,
                        (&self.replaceable_out, &self.replaceable_in),
                        "added by a replace edit",
                        diagnosis,
                    );
                }
                for triple in ctx.removed {
                    self.check_whitelisted(
                        triple,
                        uri,
                        (&self.replaceable_out, &self.replaceable_in),
                        "removed by a replace edit",
                        diagnosis,
                    );
                }
            }
            EditMode::Append => {
                for triple in ctx.removed {
                    diagnosis.push(format!("append edits cannot remove {triple}"));
                }
                for triple in ctx.added {
                    self.check_whitelisted(
                        triple,
                        uri,
                        (&self.appendable_out, &self.appendable_in),
                        "added by an append edit",
                        diagnosis,
                    );
                }
            }
        }
    }

    fn check_whitelisted(
        &self,
        triple: &Triple,
        uri: &str,
        (out, inc): (&BTreeSet<String>, &BTreeSet<String>),
        action: &str,
        diagnosis: &mut Diagnosis,
    ) {
        if triple.subject.is_iri(uri) {
            if triple.predicate == RDF_TYPE {
                let allowed = triple
                    .object
                    .as_iri()
                    .is_some_and(|t| self.allowed_types.contains(t));
                if !allowed {
                    diagnosis.push(format!(
                        "type {} cannot be {action} on <{uri}>",
                        triple.object
                    ));
                }
            } else if !out.contains(&triple.predicate) {
                diagnosis.push(format!(
                    "outgoing <{}> cannot be {action}",
                    triple.predicate
                ));
            }
        } else if triple.object.is_iri(uri) && !inc.contains(&triple.predicate) {
            diagnosis.push(format!(
                "incoming <{}> cannot be {action}",
                triple.predicate
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "http://host/base1/m1";
    const T: &str = "http://ex.org/Thing";
    const P: &str = "http://ex.org/p";
    const Q: &str = "http://ex.org/q";

    fn typed() -> Graph {
        vec![Triple::new(Term::iri(URI), RDF_TYPE, Term::iri(T))]
            .into_iter()
            .collect()
    }

    fn out(p: &str, o: &str) -> Triple {
        Triple::new(Term::iri(URI), p, Term::literal(o))
    }

    fn check(
        contract: &TypeContract,
        graph: &Graph,
        added: &Graph,
        removed: &Graph,
        mode: EditMode,
    ) -> Diagnosis {
        let mut d = Diagnosis::new();
        contract.check(
            &CheckContext {
                uri: URI,
                graph,
                added,
                removed,
                mode,
            },
            &mut d,
        );
        d
    }

    #[test]
    fn exact_cardinality() {
        let contract = TypeContract::new(T).outgoing(Cardinality::exactly(P, 1));
        let empty = Graph::new();

        let d = check(&contract, &typed(), &empty, &empty, EditMode::Internal);
        assert!(d.mentions(P), "{d}");
        assert!(d.mentions("at least 1"));

        let mut one = typed();
        one.insert(out(P, "a"));
        assert!(check(&contract, &one, &empty, &empty, EditMode::Internal).is_valid());

        let mut two = one.clone();
        two.insert(out(P, "b"));
        let d = check(&contract, &two, &empty, &empty, EditMode::Internal);
        assert!(d.mentions("at most 1"));
    }

    #[test]
    fn incoming_and_outgoing_are_independent() {
        let contract = TypeContract::new(T)
            .outgoing(Cardinality::optional(P))
            .incoming(Cardinality::exactly(P, 1));
        let empty = Graph::new();

        let mut g = typed();
        g.insert(Triple::new(Term::iri("http://host/x"), P, Term::iri(URI)));
        g.insert(Triple::new(Term::iri(URI), P, Term::iri("http://host/y")));
        assert!(check(&contract, &g, &empty, &empty, EditMode::Internal).is_valid());

        g.insert(Triple::new(Term::iri("http://host/z"), P, Term::iri(URI)));
        let d = check(&contract, &g, &empty, &empty, EditMode::Internal);
        assert_eq!(d.messages().len(), 1);
        assert!(d.mentions("incoming"));
    }

    #[test]
    fn declared_type_must_remain() {
        let contract = TypeContract::new(T);
        let empty = Graph::new();
        let d = check(&contract, &empty, &empty, &empty, EditMode::Internal);
        assert!(d.mentions("declared type"));
    }

    #[test]
    fn foreign_statements_are_rejected() {
        let contract = TypeContract::new(T);
        let empty = Graph::new();
        let mut g = typed();
        g.insert(Triple::new(Term::iri("http://host/a"), P, Term::iri("http://host/b")));
        let d = check(&contract, &g, &empty, &empty, EditMode::Internal);
        assert!(d.mentions("does not involve"));
    }

    #[test]
    fn replace_whitelist() {
        let contract = TypeContract::new(T)
            .replaceable_out([P])
            .allowed_types(["http://ex.org/Extra"]);
        let empty = Graph::new();

        let ok: Graph = vec![out(P, "a")].into_iter().collect();
        let mut g = typed().union(&ok);
        assert!(check(&contract, &g, &ok, &empty, EditMode::Replace).is_valid());

        let bad: Graph = vec![out(Q, "a")].into_iter().collect();
        g = g.union(&bad);
        let d = check(&contract, &g, &bad, &empty, EditMode::Replace);
        assert!(d.mentions(Q));

        let extra: Graph = vec![Triple::new(
            Term::iri(URI),
            RDF_TYPE,
            Term::iri("http://ex.org/Other"),
        )]
        .into_iter()
        .collect();
        let d = check(&contract, &typed().union(&extra), &extra, &empty, EditMode::Replace);
        assert!(d.mentions("http://ex.org/Other"));
    }

    #[test]
    fn append_cannot_remove() {
        let contract = TypeContract::new(T).appendable_out([P]);
        let removed: Graph = vec![out(P, "a")].into_iter().collect();
        let added: Graph = vec![out(P, "b")].into_iter().collect();
        let g = typed().union(&added);

        let d = check(&contract, &g, &added, &removed, EditMode::Append);
        assert_eq!(d.messages().len(), 1);
        assert!(d.mentions("cannot remove"));
    }

    #[test]
    fn internal_edits_skip_whitelists() {
        let contract = TypeContract::new(T);
        let added: Graph = vec![out(Q, "a")].into_iter().collect();
        let g = typed().union(&added);
        assert!(check(&contract, &g, &added, &Graph::new(), EditMode::Internal).is_valid());
    }
}
