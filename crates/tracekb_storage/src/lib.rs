//! # tracekb Storage
//!
//! RDF data model and shared graph store backends for tracekb.
//!
//! This crate provides the lowest-level storage abstraction for tracekb.
//! Backends store one graph shared by every resource, plus a small
//! bookkeeping record per resource. They know nothing about resource types,
//! validation or locking of resources.
//!
//! ## Design Principles
//!
//! - Backends expose per-resource fragments (statements where a resource is
//!   subject or object)
//! - Writers are serialized, and a write section publishes atomically
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available Backends
//!
//! - [`InMemoryGraph`] - For testing and single-process stores
//! - [`FileGraph`] - For stores shared by several processes
//!
//! ## Example
//!
//! ```rust
//! use tracekb_storage::{GraphBackend, InMemoryGraph};
//!
//! let backend = InMemoryGraph::new();
//! let frag = backend.fragment("http://localhost/").unwrap();
//! assert!(!frag.exists());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod model;

pub use backend::{
    Fragment, FragmentUpdate, GraphBackend, GraphState, MetaUpdate, ResourceMeta, WriteGuard,
};
pub use error::{StorageError, StorageResult};
pub use file::{FileGraph, FORMAT_VERSION};
pub use memory::InMemoryGraph;
pub use model::{Graph, Term, Triple};
