//! Commit-time validation for revisions
//!
//! A revision conflicts only when a value it read has since diverged from
//! what its parent currently shows for the same (instance, key):
//! - Conflicts are detected on the READ set, never the write set
//! - Blind writes (write without read) do NOT conflict
//! - Disjoint (instance, key) pairs never conflict
//!
//! Validation is side-effect free: the parent is inspected with
//! [`Revision::peek_value_for`], which records nothing.

use crate::revision::{ReadSet, Revision};
use nodb_core::{InstanceId, Value};

/// Types of conflicts that can occur during revision validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictType {
    /// Read-write conflict: the parent's value differs from the recorded read
    ReadWriteConflict {
        /// Instance whose property diverged
        instance: InstanceId,
        /// Property name
        key: String,
        /// Value observed when the revision first read it (`None` = absent)
        read_value: Option<Value>,
        /// Value the parent shows at validation time (`None` = absent)
        current_value: Option<Value>,
    },
}

/// Result of revision validation
///
/// Accumulates all conflicts found during validation.
/// A revision commits only if is_valid() returns true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Create a successful validation result (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Create a validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Validate a read set against the parent's current view
///
/// For each recorded `(instance, key, value)`, compares `value` with what
/// `parent` shows now using [`Value::same_as`], so an unchanged `NaN`
/// never reads as a divergence. Every mismatch becomes a `ReadWriteConflict`; all
/// reads are checked so the result reports every divergence at once.
pub fn validate_reads(reads: &ReadSet, parent: &Revision) -> ValidationResult {
    let mut result = ValidationResult::ok();

    for (instance, values) in reads {
        for (key, read_value) in values {
            let current_value = parent.peek_value_for(instance, key);
            let unchanged = match (&current_value, read_value) {
                (Some(current), Some(read)) => current.same_as(read),
                (None, None) => true,
                _ => false,
            };
            if !unchanged {
                result.conflicts.push(ConflictType::ReadWriteConflict {
                    instance: instance.id(),
                    key: key.clone(),
                    read_value: read_value.clone(),
                    current_value,
                });
            }
        }
    }

    result
}
