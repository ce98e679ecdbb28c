//! Concurrency layer for NoDB
//!
//! This crate implements optimistic concurrency control over a tree of
//! copy-on-write revisions:
//! - Revision: overlay of pending creates, deletes, reads and writes
//! - Validation: read-set conflict detection at commit time
//! - Current: the thread's installed revision
//!
//! Commit is first-committer-wins. A revision aborts only when a value it
//! read has changed in its parent; writes alone never conflict.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod current;
pub mod revision;
pub mod validation;

pub use current::current;
pub use revision::{CommitError, CommitStats, PendingOperations, ReadSet, Revision, WriteSet};
pub use validation::{validate_reads, ConflictType, ValidationResult};
