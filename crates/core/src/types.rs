//! Identity types for NoDB
//!
//! This module defines:
//! - ModelId: Process-unique identifier of a model
//! - InstanceId: Process-unique identifier of an instance
//! - RevisionId: Unique identifier of a revision (overlay)
//! - Instance: Identity-bearing handle created from a model
//!
//! An instance never stores property values. Its values live in the
//! revision chain and are reached through a model and a revision.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

static NEXT_MODEL_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a model
///
/// Allocated from a process-wide monotonic counter, so two models never
/// share an id even when they share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelId(u64);

impl ModelId {
    /// Allocate the next model id
    pub fn next() -> Self {
        Self(NEXT_MODEL_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model#{}", self.0)
    }
}

/// Unique identifier for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate the next instance id
    pub fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Unique identifier for a revision
///
/// Only used for diagnostics (log fields, Debug output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionId(Uuid);

impl RevisionId {
    /// Create a new random RevisionId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the raw bytes of this RevisionId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for RevisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to an object created by a model
///
/// Equality and hashing use the instance id only: two handles are equal
/// exactly when they denote the same instance.
///
/// The handle carries the creating model and the ancestors it extends, so
/// ownership tests need no registry lookup.
#[derive(Clone)]
pub struct Instance {
    id: InstanceId,
    model: ModelId,
    /// Ancestors of `model`, nearest first
    ancestors: Arc<[ModelId]>,
}

impl Instance {
    /// Create a fresh instance of `model`, which extends `ancestors`
    pub fn new(model: ModelId, ancestors: Arc<[ModelId]>) -> Self {
        Self {
            id: InstanceId::next(),
            model,
            ancestors,
        }
    }

    /// Create a fresh instance of a model with no parent
    pub fn of(model: ModelId) -> Self {
        Self::new(model, Arc::from(Vec::new()))
    }

    /// Identity of this instance
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The model that created this instance
    pub fn model_id(&self) -> ModelId {
        self.model
    }

    /// Creating model followed by its ancestors
    pub fn lineage(&self) -> impl Iterator<Item = ModelId> + '_ {
        std::iter::once(self.model).chain(self.ancestors.iter().copied())
    }

    /// Check whether this instance belongs to `model` or one of its descendants
    pub fn is_instance_of(&self, model: ModelId) -> bool {
        self.model == model || self.ancestors.contains(&model)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({}, {})", self.id, self.model_id())
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
