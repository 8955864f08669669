//! Type registry.

use crate::error::{CoreError, CoreResult};
use crate::kind::ResourceKind;
use crate::kinds::{Base, ComputedTrace, Method, Root, StoredTrace};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maps type IRIs to the kinds handling them.
///
/// Each store owns its registry; nothing is registered globally.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    kinds: BTreeMap<String, Arc<dyn ResourceKind>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the trace-base kinds.
    #[must_use]
    pub fn with_trace_kinds() -> Self {
        let mut registry = Self::new();
        let kinds: [Arc<dyn ResourceKind>; 5] = [
            Arc::new(Root::new()),
            Arc::new(Base::new()),
            Arc::new(StoredTrace::new()),
            Arc::new(ComputedTrace::new()),
            Arc::new(Method::new()),
        ];
        for kind in kinds {
            registry.kinds.insert(kind.rdf_type().to_string(), kind);
        }
        registry
    }

    /// Registers a kind.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if its type is already registered.
    pub fn register(&mut self, kind: Arc<dyn ResourceKind>) -> CoreResult<()> {
        let rdf_type = kind.rdf_type().to_string();
        if self.kinds.contains_key(&rdf_type) {
            return Err(CoreError::invalid_operation(format!(
                "type <{rdf_type}> is already registered"
            )));
        }
        self.kinds.insert(rdf_type, kind);
        Ok(())
    }

    /// Looks up the kind of a stored type.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedStore`: a stored resource with an unknown type
    /// means the store and the registry disagree.
    pub fn get(&self, rdf_type: &str) -> CoreResult<Arc<dyn ResourceKind>> {
        self.kinds.get(rdf_type).cloned().ok_or_else(|| {
            CoreError::corrupted(format!("no kind registered for type <{rdf_type}>"))
        })
    }

    /// Returns true if `rdf_type` is registered.
    #[must_use]
    pub fn contains(&self, rdf_type: &str) -> bool {
        self.kinds.contains_key(rdf_type)
    }

    /// Iterates over registered kinds in type order.
    pub fn kinds(&self) -> impl Iterator<Item = &Arc<dyn ResourceKind>> {
        self.kinds.values()
    }

    /// Types whose membership edits are lock-protected.
    #[must_use]
    pub fn lock_protected_types(&self) -> Vec<&str> {
        self.kinds
            .values()
            .filter(|k| k.contract().lock_protected)
            .map(|k| k.rdf_type())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::TypeContract;
    use crate::vocab::ktbs;

    #[derive(Debug)]
    struct Custom(TypeContract);

    impl ResourceKind for Custom {
        fn contract(&self) -> &TypeContract {
            &self.0
        }
    }

    #[test]
    fn trace_kinds_are_registered() {
        let registry = Registry::with_trace_kinds();
        for t in [
            ktbs::KTBS_ROOT,
            ktbs::BASE,
            ktbs::STORED_TRACE,
            ktbs::COMPUTED_TRACE,
            ktbs::METHOD,
        ] {
            assert!(registry.contains(t), "{t}");
        }
        assert_eq!(
            registry.lock_protected_types(),
            vec![ktbs::BASE, ktbs::KTBS_ROOT]
        );
    }

    #[test]
    fn unknown_type_is_corruption() {
        let registry = Registry::new();
        let err = registry.get("http://ex.org/Nope").unwrap_err();
        assert!(matches!(err, CoreError::CorruptedStore { .. }));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::new();
        let kind = Arc::new(Custom(TypeContract::new("http://ex.org/T")));
        registry.register(kind.clone()).unwrap();
        assert!(registry.register(kind).is_err());
    }
}
