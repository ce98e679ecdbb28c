//! NoDB - embeddable in-memory object store
//!
//! NoDB layers typed models, secondary indexes and snapshot-isolated nested
//! transactions over plain object instances, without an external database
//! process.
//!
//! # Quick Start
//!
//! ```ignore
//! use nodb::{ModelDefinition, PropertyType, Store, Value};
//!
//! let store = Store::new();
//! let person = store.create(
//!     ModelDefinition::new("Person")
//!         .property("firstName", PropertyType::String)
//!         .property("age", PropertyType::Integer)
//!         .index("byName", "firstName"),
//! )?;
//!
//! let p = store.transact(|rev| person.create(rev, [("firstName", "Gillis")]))?;
//! store.transact(|rev| person.set(rev, &p, "age", 30))?;
//!
//! assert_eq!(person.get(store.root(), &p, "age")?, Value::Int(30));
//! assert_eq!(person.find(store.root(), "byName", "Gillis").count(), 1);
//! ```
//!
//! # Architecture
//!
//! - `nodb-core`: values, identities, errors and lazy sequences
//! - `nodb-concurrency`: the revision tree and commit-time validation
//! - `nodb-engine`: models, indexes, queries and the store

pub use nodb_concurrency::{
    current, CommitError, CommitStats, ConflictType, PendingOperations, Revision,
    ValidationResult,
};
pub use nodb_core::{
    sequence, Error, Instance, InstanceId, ModelId, Result, RevisionId, Sequence, SequenceExt,
    Value,
};
pub use nodb_engine::{
    Comparator, Index, IndexKey, InstanceView, Model, ModelDefinition, MutationObserver,
    Property, PropertyType, Query, RetryConfig, Store, StoreConfig, Target,
    TransactionMetrics,
};
