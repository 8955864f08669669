//! Method chain resolution.
//!
//! A method names its parent with `ktbs:hasParentMethod`. The chain is
//! followed until a builtin method (terminal, no stored representation) or
//! a method without parent. Parameters are merged from the most distant
//! ancestor toward the requested method, so that closer definitions win.

use crate::error::{CoreError, CoreResult};
use crate::identifier::Iri;
use crate::store::Store;
use crate::vocab::{builtin, ktbs};
use std::collections::{BTreeMap, HashSet};
use tracekb_storage::Graph;
use tracing::debug;

/// Name to value.
pub type Parameters = BTreeMap<String, String>;

/// A resolved method chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodChain {
    /// Stored methods visited, starting with the requested one.
    pub methods: Vec<Iri>,
    /// The builtin the chain ends at, if any.
    pub builtin: Option<String>,
    /// Merged parameters.
    pub parameters: Parameters,
}

/// Splits a `name=value` parameter literal.
///
/// The name is everything before the first `=`; it must be non-empty and
/// made of ASCII letters, digits, `_` and `-`. The value may be empty and
/// may contain further `=`.
#[must_use]
pub fn parse_parameter(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once('=')?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    valid.then_some((name, value))
}

/// Own `ktbs:hasParameter` values of `uri` in `graph`.
///
/// Malformed literals are skipped; they never survive a commit.
#[must_use]
pub fn parameters_of(uri: &str, graph: &Graph) -> Parameters {
    graph
        .objects(uri, ktbs::HAS_PARAMETER)
        .filter_map(|o| o.as_literal())
        .filter_map(parse_parameter)
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Resolves method chains against a store.
#[derive(Debug, Clone, Copy)]
pub struct MethodChainResolver<'s> {
    store: &'s Store,
}

impl<'s> MethodChainResolver<'s> {
    /// Creates a resolver reading from `store`.
    #[must_use]
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Resolves the chain starting at `method`.
    ///
    /// A builtin `method` resolves to an empty chain ending at itself.
    ///
    /// # Errors
    ///
    /// - `Configuration` on a cycle, or if a parent is missing, not a
    ///   method, or in another base than `method`
    /// - `NotFound` if `method` itself does not exist
    pub fn resolve(&self, method: &Iri) -> CoreResult<MethodChain> {
        if builtin::is_builtin(method.as_str()) {
            return Ok(MethodChain {
                builtin: Some(method.to_string()),
                ..MethodChain::default()
            });
        }

        let container = self.store.container_of(method)?;
        let mut visited = HashSet::new();
        let mut own = Vec::new();
        let mut chain = MethodChain::default();
        let mut current = method.clone();

        loop {
            if !visited.insert(current.clone()) {
                return Err(CoreError::configuration(format!(
                    "method chain of <{method}> loops through <{current}>"
                )));
            }

            let fragment = self.store.backend().fragment(current.as_str())?;
            let Some(meta) = fragment.meta else {
                if current == *method {
                    return Err(CoreError::not_found(method.as_str()));
                }
                return Err(CoreError::configuration(format!(
                    "parent method <{current}> does not exist"
                )));
            };
            if meta.kind != ktbs::METHOD {
                return Err(CoreError::configuration(format!(
                    "<{current}> is a <{}>, not a method",
                    meta.kind
                )));
            }
            if current != *method && self.store.container_of(&current)? != container {
                return Err(CoreError::configuration(format!(
                    "parent method <{current}> is not in the base of <{method}>"
                )));
            }

            own.push(parameters_of(current.as_str(), &fragment.graph));
            chain.methods.push(current.clone());

            let parent = fragment
                .graph
                .object(current.as_str(), ktbs::HAS_PARENT_METHOD)
                .and_then(|o| o.as_iri())
                .map(str::to_string);
            match parent {
                None => break,
                Some(p) if builtin::is_builtin(&p) => {
                    chain.builtin = Some(p);
                    break;
                }
                Some(p) => {
                    current = Iri::new(p.as_str()).map_err(|_| {
                        CoreError::configuration(format!(
                            "parent method <{p}> of <{current}> is not a valid IRI"
                        ))
                    })?;
                }
            }
        }

        for parameters in own.into_iter().rev() {
            chain.parameters.extend(parameters);
        }
        debug!(
            method = %method,
            depth = chain.methods.len(),
            builtin = chain.builtin.as_deref().unwrap_or("-"),
            "method chain resolved"
        );
        Ok(chain)
    }

    /// Merged parameters of `method`.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_parameters(&self, method: &Iri) -> CoreResult<Parameters> {
        self.resolve(method).map(|chain| chain.parameters)
    }

    /// Resolves the method of a computed trace, then overlays the trace's own
    /// parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidOperation` if `trace` is not a computed trace
    /// - `Configuration` if its method is missing, in another base, or its
    ///   chain does not resolve
    pub fn resolve_for(&self, trace: &Iri) -> CoreResult<MethodChain> {
        let fragment = self.store.backend().fragment(trace.as_str())?;
        let meta = fragment
            .meta
            .ok_or_else(|| CoreError::not_found(trace.as_str()))?;
        if meta.kind != ktbs::COMPUTED_TRACE {
            return Err(CoreError::invalid_operation(format!(
                "<{trace}> is not a computed trace"
            )));
        }

        let method = fragment
            .graph
            .object(trace.as_str(), ktbs::HAS_METHOD)
            .and_then(|o| o.as_iri())
            .ok_or_else(|| CoreError::configuration(format!("<{trace}> has no method")))?;
        let method = Iri::new(method).map_err(|_| {
            CoreError::configuration(format!("method <{method}> of <{trace}> is not a valid IRI"))
        })?;

        if !builtin::is_builtin(method.as_str()) {
            if self.store.backend().meta(method.as_str())?.is_none() {
                return Err(CoreError::configuration(format!(
                    "method <{method}> of <{trace}> does not exist"
                )));
            }
            if self.store.container_of(&method)? != self.store.container_of(trace)? {
                return Err(CoreError::configuration(format!(
                    "method <{method}> is not in the base of <{trace}>"
                )));
            }
        }

        let mut chain = self.resolve(&method)?;
        chain
            .parameters
            .extend(parameters_of(trace.as_str(), &fragment.graph));
        Ok(chain)
    }
}
