//! Error types for NoDB
//!
//! This module defines all error types surfaced to applications.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Retry policy
//!
//! Only [`Error::CommitConflict`] is retried by the transaction driver.
//! Every other variant propagates to the caller immediately.

use thiserror::Error;

/// Result type alias for NoDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for NoDB
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A property value failed its type's validation
    #[error("invalid value for property '{property}' of model '{model}': expected {expected}, got {actual}")]
    InvalidProperty {
        /// Model declaring the property
        model: String,
        /// Property name
        property: String,
        /// Description of the accepted values
        expected: &'static str,
        /// Type name of the offending value
        actual: &'static str,
    },

    /// A property name is not declared by the model or its ancestors
    #[error("model '{model}' has no property '{property}'")]
    UnknownProperty {
        /// Model that was asked
        model: String,
        /// Property name
        property: String,
    },

    /// A model declares a property name twice, or redeclares an inherited one
    #[error("property '{property}' is declared more than once for model '{model}'")]
    DuplicateProperty {
        /// Model being defined
        model: String,
        /// Property name
        property: String,
    },

    /// A model declares an index name twice, or redeclares an inherited one
    #[error("index '{index}' is declared more than once for model '{model}'")]
    DuplicateIndex {
        /// Model being defined
        model: String,
        /// Index name
        index: String,
    },

    /// An instance was passed to a model it does not belong to
    #[error("{instance} is not an instance of model '{model}'")]
    ForeignInstance {
        /// Model that was asked
        model: String,
        /// Offending instance
        instance: crate::types::InstanceId,
    },

    /// No registered model matches the name or id
    #[error("unknown model '{model}'")]
    UnknownModel {
        /// Model name or id
        model: String,
    },

    /// A model with the same name is already registered
    #[error("model '{model}' is already registered")]
    DuplicateModel {
        /// Model name
        model: String,
    },

    /// A value read by a revision diverged in its parent before commit
    #[error("commit conflict: {conflicts} read(s) diverged from the parent revision")]
    CommitConflict {
        /// Number of diverged reads
        conflicts: usize,
    },

    /// The root revision was asked to commit or revert
    #[error("cannot {operation} the root revision")]
    RootRevision {
        /// "commit" or "revert"
        operation: &'static str,
    },

    /// Direct assignment to a collection, or collection edit of a scalar
    #[error("unsupported mutation of property '{property}' of model '{model}'")]
    UnsupportedMutation {
        /// Model declaring the property
        model: String,
        /// Property name
        property: String,
    },

    /// The transaction driver gave up after a configured number of conflicts
    #[error("transaction aborted after {attempts} conflicting attempt(s)")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: usize,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Check whether this error is a commit conflict (the only retried condition)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::CommitConflict { .. })
    }

    /// Check whether this error is a validation failure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidProperty { .. } | Error::UnknownProperty { .. }
        )
    }
}
