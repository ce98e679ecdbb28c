//! Object engine for NoDB
//!
//! This crate builds typed objects on top of the revision layer:
//! - PropertyType / Property: per-property validation and defaults
//! - Model: schema, instance creation and property access
//! - Index: live secondary lookups kept by two-phase mutation hooks
//! - Query: conditional filtering with comparators
//! - Store: model registry, root revision and the retrying transaction driver
//!
//! Every operation takes the revision it works in explicitly. The store's
//! transaction driver also installs that revision as the thread's current
//! one, so nested `transact` calls nest their branches.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod index;
pub mod model;
pub mod property;
pub mod query;
pub mod store;

pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use index::{Index, IndexKey, InstanceView, MutationObserver};
pub use model::{Model, ModelDefinition};
pub use property::{Property, PropertyType, Target};
pub use query::{Comparator, Query};
pub use store::{RetryConfig, Store, StoreConfig};
