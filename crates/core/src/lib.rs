//! Core types for NoDB
//!
//! This crate defines the foundational types used throughout the system:
//! - ModelId / InstanceId / RevisionId: identities
//! - Instance: identity-bearing handle created by a model
//! - Value: unified value enum for all property values
//! - Error: error taxonomy
//! - Sequence: the lazy iteration contract every query returns

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod sequence;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use sequence::{Sequence, SequenceExt};
pub use types::{Instance, InstanceId, ModelId, RevisionId};
pub use value::Value;
