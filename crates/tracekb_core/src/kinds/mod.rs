//! Resource kinds of a trace base.
//!
//! - [`Root`]: container of bases
//! - [`Base`]: container of traces and methods, deletable once empty
//! - [`StoredTrace`], [`ComputedTrace`]: traces
//! - [`Method`]: user-defined, parameterized transformation

mod container;
mod method;
mod trace;

pub use container::{Base, Root};
pub use method::Method;
pub use trace::{ComputedTrace, StoredTrace};

use crate::error::Diagnosis;
use crate::method_chain::parse_parameter;
use crate::vocab::ktbs;
use std::collections::BTreeSet;
use tracekb_storage::Graph;

/// Every `ktbs:hasParameter` of `uri` must be a `name=value` literal, and
/// names must not repeat.
fn check_parameters(uri: &str, graph: &Graph, diagnosis: &mut Diagnosis) {
    let mut names = BTreeSet::new();
    for object in graph.objects(uri, ktbs::HAS_PARAMETER) {
        let Some(text) = object.as_literal() else {
            diagnosis.push(format!("parameter {object} of <{uri}> is not a literal"));
            continue;
        };
        match parse_parameter(text) {
            Some((name, _)) => {
                if !names.insert(name) {
                    diagnosis.push(format!("parameter {name:?} of <{uri}> is set twice"));
                }
            }
            None => diagnosis.push(format!(
                "parameter {text:?} of <{uri}> is not of the form name=value"
            )),
        }
    }
}

/// Objects of `<uri> <predicate>` must be IRIs other than `uri`.
fn check_references(uri: &str, graph: &Graph, predicate: &str, diagnosis: &mut Diagnosis) {
    for object in graph.objects(uri, predicate) {
        match object.as_iri() {
            None => diagnosis.push(format!(
                "<{predicate}> of <{uri}> must be an IRI, got {object}"
            )),
            Some(iri) if iri == uri => {
                diagnosis.push(format!("<{uri}> cannot reference itself with <{predicate}>"));
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracekb_storage::{Term, Triple};

    const M: &str = "http://host/b/m";

    fn param(value: Term) -> Triple {
        Triple::new(Term::iri(M), ktbs::HAS_PARAMETER, value)
    }

    #[test]
    fn parameters_are_checked() {
        let g: Graph = [
            param(Term::literal("x=1")),
            param(Term::literal("x=2")),
            param(Term::literal("oops")),
            param(Term::iri("http://host/y=1")),
        ]
        .into_iter()
        .collect();

        let mut d = Diagnosis::new();
        check_parameters(M, &g, &mut d);
        assert_eq!(d.messages().len(), 3, "{d}");
        assert!(d.mentions("set twice"));
        assert!(d.mentions("name=value"));
        assert!(d.mentions("not a literal"));
    }

    #[test]
    fn self_reference_is_rejected() {
        let g: Graph = [Triple::new(Term::iri(M), ktbs::HAS_PARENT_METHOD, Term::iri(M))]
            .into_iter()
            .collect();
        let mut d = Diagnosis::new();
        check_references(M, &g, ktbs::HAS_PARENT_METHOD, &mut d);
        assert!(d.mentions("itself"));
    }
}
