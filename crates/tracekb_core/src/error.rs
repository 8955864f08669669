//! Error types for tracekb core.

use crate::lock::LockName;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Ordered list of validation failures. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnosis {
    messages: Vec<String>,
}

impl Diagnosis {
    /// Creates an empty diagnosis.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Returns true if no failure was recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.messages.is_empty()
    }

    /// Failure messages in the order they were found.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Returns true if some message contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.messages.is_empty() {
            return f.write_str("valid");
        }
        f.write_str(&self.messages.join("; "))
    }
}

/// Errors that can occur in tracekb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Graph store error.
    #[error("storage error: {0}")]
    Storage(#[from] tracekb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An edit failed structural validation. The store is unchanged.
    #[error("invalid edit of <{uri}>: {diagnosis}")]
    Validation {
        /// The edited resource.
        uri: String,
        /// Every failed check.
        diagnosis: Diagnosis,
    },

    /// A lock could not be acquired in time.
    #[error("lock {lock} busy after {timeout:?}")]
    Busy {
        /// The contended lock.
        lock: LockName,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// A conditional precondition on the resource's entity tag failed.
    #[error("resource <{uri}> was modified concurrently")]
    ConcurrentModification {
        /// The resource.
        uri: String,
    },

    /// The store contains something the registry cannot explain.
    #[error("corrupted store: {message}")]
    CorruptedStore {
        /// Description of the inconsistency.
        message: String,
    },

    /// A method chain or computed resource is misconfigured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The resource does not exist.
    #[error("resource not found: <{uri}>")]
    NotFound {
        /// The missing resource.
        uri: String,
    },

    /// A resource with this identifier already exists.
    #[error("resource already exists: <{uri}>")]
    AlreadyExists {
        /// The existing resource.
        uri: String,
    },

    /// An identifier could not be parsed or resolved.
    #[error("invalid identifier: {message}")]
    InvalidIdentifier {
        /// Description of the problem.
        message: String,
    },

    /// An entity tag could not be parsed.
    #[error("invalid entity tag: {text:?}")]
    InvalidEntityTag {
        /// The offending text.
        text: String,
    },

    /// Operation not permitted on this resource or in this state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(uri: impl Into<String>, diagnosis: Diagnosis) -> Self {
        Self::Validation {
            uri: uri.into(),
            diagnosis,
        }
    }

    /// Creates a corrupted store error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::CorruptedStore {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    /// Creates an invalid identifier error.
    pub fn invalid_identifier(message: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the diagnosis of a validation error.
    #[must_use]
    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            Self::Validation { diagnosis, .. } => Some(diagnosis),
            _ => None,
        }
    }
}
