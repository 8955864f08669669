//! # tracekb Core
//!
//! Transactional kernel exposing RDF resources through a uniform interface.
//!
//! This crate provides:
//! - Edit transactions with structural validation and atomic commit
//! - Resource kinds declaring cardinality constraints and edit whitelists
//! - Named locks shared across processes, with offline recovery
//! - Entity tags for conditional requests
//! - Method chain resolution for computed traces
//!
//! ## Example
//!
//! ```rust,ignore
//! use tracekb_core::{builtin, ktbs, Config, LockTimeout, Registry, Store};
//! use tracekb_storage::Term;
//!
//! let store = Store::in_memory(
//!     Config::new(LockTimeout::Indefinite),
//!     Registry::with_trace_kinds(),
//! )?;
//! let base = store.post(store.root(), ktbs::BASE, Some("b1"), |_| Ok(()))?;
//! let method = store.post(&base, ktbs::METHOD, Some("m"), |tx| {
//!     tx.add(ktbs::HAS_PARENT_METHOD, Term::iri(builtin::FILTER));
//!     tx.add(ktbs::HAS_PARAMETER, Term::literal("after=10"));
//!     Ok(())
//! })?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod admin;
mod config;
mod contract;
mod error;
mod etag;
mod identifier;
mod kind;
pub mod kinds;
pub mod lock;
mod method_chain;
mod registry;
mod store;
mod transaction;
pub mod vocab;

pub use config::{Config, LockBackend};
pub use contract::{Cardinality, CheckContext, EditMode, TypeContract};
pub use error::{CoreError, CoreResult, Diagnosis};
pub use etag::{Comparison, EntityTag, EntityTagSet};
pub use identifier::{HasUri, Identifier, Iri};
pub use kind::{CommitInfo, Deletable, Editable, Postable, ResourceKind};
pub use lock::{LockGuard, LockManager, LockName, LockTimeout};
pub use method_chain::{
    parameters_of, parse_parameter, MethodChain, MethodChainResolver, Parameters,
};
pub use registry::Registry;
pub use store::{StateParams, Store, LOCK_DIR};
pub use transaction::{CommitReport, EditTransaction, TransactionState};
pub use vocab::{builtin, ktbs};
