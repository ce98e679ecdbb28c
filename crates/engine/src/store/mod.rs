//! The store: model registry, root revision and transaction driver
//!
//! # Transactions
//!
//! [`Store::transact`] runs a closure on a fresh branch of the thread's
//! current revision (or of the root) and commits it. On a commit conflict
//! the branch is discarded and the closure runs again on a new branch, so
//! the closure must be safe to re-run. An `Err` from the closure discards
//! the branch and is returned as is; it is never retried.
//!
//! ```ignore
//! let store = Store::new();
//! let person = store.create(ModelDefinition::new("Person").property("age", PropertyType::Integer))?;
//! let p = store.transact(|rev| person.create(rev, [("age", 30)]))?;
//! assert_eq!(person.get(store.root(), &p, "age")?, Value::Int(30));
//! ```
//!
//! # Discarding
//!
//! Index buckets are shared by every revision and never lose entries on
//! behalf of a branch, so reverting a branch needs no index repair. The
//! entries it staged are filtered by [`Model::find`](crate::Model::find)
//! and pruned once the root has no live branch.

mod config;
mod registry;

pub use config::{RetryConfig, StoreConfig};

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use crate::model::{Model, ModelDefinition};
use nodb_concurrency::{CommitError, Revision};
use nodb_core::{Error, Instance, Result, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// An in-memory object store
pub struct Store {
    root: Arc<Revision>,
    models: RwLock<Vec<Arc<Model>>>,
    config: StoreConfig,
    coordinator: TransactionCoordinator,
}

impl Store {
    /// Create an empty store with the default configuration
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            root: Revision::new_root(),
            models: RwLock::new(Vec::new()),
            config,
            coordinator: TransactionCoordinator::new(),
        }
    }

    /// The process-wide store
    pub fn global() -> &'static Store {
        &registry::GLOBAL_STORE
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The root revision (committed state)
    pub fn root(&self) -> &Arc<Revision> {
        &self.root
    }

    /// The thread's current revision if it belongs to this store, else the root
    pub fn current(&self) -> Arc<Revision> {
        match nodb_concurrency::current() {
            Some(revision) if self.owns(&revision) => revision,
            _ => Arc::clone(&self.root),
        }
    }

    fn owns(&self, revision: &Arc<Revision>) -> bool {
        let mut top = revision;
        while let Some(parent) = top.parent() {
            top = parent;
        }
        Arc::ptr_eq(top, &self.root)
    }

    /// Transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Define and register a model
    pub fn create(&self, definition: ModelDefinition) -> Result<Arc<Model>> {
        if self.model(definition.name()).is_some() {
            return Err(Error::DuplicateModel {
                model: definition.name().to_string(),
            });
        }
        let model = Model::define(definition)?;
        self.register(Arc::clone(&model))?;
        Ok(model)
    }

    /// Register a model built elsewhere
    ///
    /// Instances of unregistered models are not re-indexed when a branch
    /// is discarded.
    pub fn register(&self, model: Arc<Model>) -> Result<()> {
        let mut models = self.models.write();
        if models.iter().any(|m| m.name() == model.name()) {
            return Err(Error::DuplicateModel {
                model: model.name().to_string(),
            });
        }
        debug!(model = %model.name(), "registered model");
        models.push(model);
        Ok(())
    }

    /// Registered models, in registration order
    pub fn models(&self) -> Vec<Arc<Model>> {
        self.models.read().clone()
    }

    /// Look up a model by name
    pub fn model(&self, name: &str) -> Option<Arc<Model>> {
        self.models.read().iter().find(|m| m.name() == name).cloned()
    }

    /// The registered model that created `instance`
    pub fn model_of(&self, instance: &Instance) -> Result<Arc<Model>> {
        let id = instance.model_id();
        self.models
            .read()
            .iter()
            .find(|m| m.id() == id)
            .cloned()
            .ok_or_else(|| Error::UnknownModel {
                model: id.to_string(),
            })
    }

    /// Read a property of any registered model's instance
    pub fn get(&self, revision: &Revision, instance: &Instance, key: &str) -> Result<Value> {
        self.model_of(instance)?.get(revision, instance, key)
    }

    /// Write a property of any registered model's instance
    pub fn set(
        &self,
        revision: &Revision,
        instance: &Instance,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.model_of(instance)?.set(revision, instance, key, value)
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Run `work` in a transaction branched off the current revision
    ///
    /// See [`Store::transact_in`].
    pub fn transact<T, F>(&self, work: F) -> Result<T>
    where
        F: FnMut(&Arc<Revision>) -> Result<T>,
    {
        let parent = self.current();
        self.transact_in(&parent, work)
    }

    /// Run `work` in a transaction branched off `parent`
    ///
    /// Each attempt runs `work` on a fresh branch installed as the thread's
    /// current revision, then commits the branch into `parent`.
    ///
    /// # Errors
    ///
    /// - Any error returned by `work` (the branch is discarded)
    /// - `RetriesExhausted` when `retry.max_retries` is set and exceeded
    /// - `RootRevision` is impossible: a branch always has a parent
    pub fn transact_in<T, F>(&self, parent: &Arc<Revision>, mut work: F) -> Result<T>
    where
        F: FnMut(&Arc<Revision>) -> Result<T>,
    {
        self.coordinator.record_start();
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let branch = parent.branch();

            let output = match branch.enter(|revision| work(revision)) {
                Ok(output) => output,
                Err(e) => {
                    self.coordinator.record_abort();
                    self.discard(&branch)?;
                    return Err(e);
                }
            };

            match self.coordinator.commit(&branch) {
                Ok(stats) => {
                    trace!(
                        attempts,
                        writes = stats.writes_applied,
                        created = stats.created,
                        "transaction committed"
                    );
                    return Ok(output);
                }
                Err(CommitError::Conflict(_)) => {
                    self.discard(&branch)?;
                    if !self.config.retry.allows_retry(attempts) {
                        self.coordinator.record_abort();
                        return Err(Error::RetriesExhausted { attempts });
                    }
                    if self.config.retry.should_warn(attempts) {
                        warn!(attempts, "transaction is still conflicting; retrying");
                    }
                }
                Err(e) => {
                    self.coordinator.record_abort();
                    return Err(e.into());
                }
            }
        }
    }

    /// Revert `branch`, dropping everything it staged
    pub fn discard(&self, branch: &Revision) -> Result<()> {
        if branch.is_root() {
            return Err(Error::RootRevision { operation: "revert" });
        }
        let touched = branch.touched().len();
        branch.revert()?;
        debug!(revision = %branch.id(), touched, "discarded revision");
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("models", &self.models.read().len())
            .field("config", &self.config)
            .finish()
    }
}
