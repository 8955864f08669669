//! Vocabulary IRIs.

/// `rdf:type`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// `rdfs:label`.
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Trace-base vocabulary.
pub mod ktbs {
    /// Namespace.
    pub const NS: &str = "http://liris.cnrs.fr/silex/2009/ktbs#";

    /// Type of the store's root container.
    pub const KTBS_ROOT: &str = "http://liris.cnrs.fr/silex/2009/ktbs#KtbsRoot";
    /// Type of trace bases.
    pub const BASE: &str = "http://liris.cnrs.fr/silex/2009/ktbs#Base";
    /// Type of stored traces.
    pub const STORED_TRACE: &str = "http://liris.cnrs.fr/silex/2009/ktbs#StoredTrace";
    /// Type of computed traces.
    pub const COMPUTED_TRACE: &str = "http://liris.cnrs.fr/silex/2009/ktbs#ComputedTrace";
    /// Type of user-defined methods.
    pub const METHOD: &str = "http://liris.cnrs.fr/silex/2009/ktbs#Method";

    /// Root -> base membership.
    pub const HAS_BASE: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasBase";
    /// Base -> trace/method membership.
    pub const CONTAINS: &str = "http://liris.cnrs.fr/silex/2009/ktbs#contains";
    /// Origin of a stored trace.
    pub const HAS_ORIGIN: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasOrigin";
    /// Model of a trace.
    pub const HAS_MODEL: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasModel";
    /// Source trace of a computed trace.
    pub const HAS_SOURCE: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasSource";
    /// Method of a computed trace.
    pub const HAS_METHOD: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasMethod";
    /// Parent of a method.
    pub const HAS_PARENT_METHOD: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasParentMethod";
    /// A `name=value` parameter literal.
    pub const HAS_PARAMETER: &str = "http://liris.cnrs.fr/silex/2009/ktbs#hasParameter";
}

/// Builtin methods: predefined transformations with no stored representation.
pub mod builtin {
    /// Keeps the obsels of one source matching a time window or a type.
    pub const FILTER: &str = "http://liris.cnrs.fr/silex/2009/ktbs#filter";
    /// Merges several sources into one trace.
    pub const FUSION: &str = "http://liris.cnrs.fr/silex/2009/ktbs#fusion";
    /// Applies several methods side by side.
    pub const PARALLEL: &str = "http://liris.cnrs.fr/silex/2009/ktbs#parallel";
    /// Derives obsels with a SPARQL CONSTRUCT query.
    pub const SPARQL: &str = "http://liris.cnrs.fr/silex/2009/ktbs#sparql";
    /// Incremental SPARQL derivation.
    pub const ISPARQL: &str = "http://liris.cnrs.fr/silex/2009/ktbs#isparql";
    /// Delegates to an external program.
    pub const EXTERNAL: &str = "http://liris.cnrs.fr/silex/2009/ktbs#external";

    /// Every builtin method.
    pub const ALL: [&str; 6] = [FILTER, FUSION, PARALLEL, SPARQL, ISPARQL, EXTERNAL];

    /// Returns true if `iri` names a builtin method.
    #[must_use]
    pub fn is_builtin(iri: &str) -> bool {
        ALL.contains(&iri)
    }
}
