//! Secondary indexes
//!
//! An [`Index`] maps a key derived from each instance of a model to the
//! instances currently holding that key. It is kept live through the
//! model's two-phase mutation hooks: the instance leaves its old bucket in
//! `before_set`, while the old value is still visible, and joins its new
//! bucket in `after_set`.
//!
//! Buckets are shared by every revision of a store, so they may hold
//! entries staged by an uncommitted branch or left behind by a discarded
//! one. [`Index::find`] therefore yields only members that are visible in
//! the querying revision and whose key, evaluated in that revision, equals
//! the requested key. Keys are computed with non-recording reads and never
//! enlarge a read set.
//!
//! Entries are only ever added on behalf of a branch. Removal happens when
//! the mutating or querying revision is the root and no branch of it is
//! alive; otherwise some revision may still see the old key.

use nodb_concurrency::Revision;
use nodb_core::{sequence, Instance, ModelId, Sequence, Value};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// An instance as seen through one revision
///
/// Reads are non-recording: they never add to the revision's read set.
#[derive(Clone, Copy)]
pub struct InstanceView<'a> {
    revision: &'a Revision,
    instance: &'a Instance,
}

impl<'a> InstanceView<'a> {
    /// View `instance` through `revision`
    pub fn new(revision: &'a Revision, instance: &'a Instance) -> Self {
        Self { revision, instance }
    }

    /// The viewed instance
    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    /// The revision the instance is viewed through
    pub fn revision(&self) -> &'a Revision {
        self.revision
    }

    /// Current value of a property (`Null` when absent)
    pub fn get(&self, key: &str) -> Value {
        self.revision
            .peek_value_for(self.instance, key)
            .unwrap_or_default()
    }
}

/// Subscriber to a model's lifecycle and mutation events
///
/// `before_set` fires while the old value is still visible; `after_set`
/// fires once the new value is written. Both see the same revision.
pub trait MutationObserver: Send + Sync {
    /// An instance was created and registered in the revision
    fn on_create(&self, _view: &InstanceView<'_>) {}

    /// Property `key` of the instance is about to change
    fn before_set(&self, _view: &InstanceView<'_>, _key: &str) {}

    /// Property `key` of the instance has changed
    fn after_set(&self, _view: &InstanceView<'_>, _key: &str) {}

    /// The instance is about to be removed from the revision
    fn on_delete(&self, _view: &InstanceView<'_>) {}
}

type KeyFn = dyn Fn(&InstanceView<'_>) -> Value + Send + Sync;

/// How an index derives the key of an instance
#[derive(Clone)]
pub enum IndexKey {
    /// The value of one property
    Property(String),
    /// An arbitrary function of the instance
    Derived(Arc<KeyFn>),
}

impl IndexKey {
    /// Key on a property value
    pub fn property(name: impl Into<String>) -> Self {
        IndexKey::Property(name.into())
    }

    /// Key on a derived value
    pub fn derived<F>(generator: F) -> Self
    where
        F: Fn(&InstanceView<'_>) -> Value + Send + Sync + 'static,
    {
        IndexKey::Derived(Arc::new(generator))
    }

    /// Compute the key of a viewed instance
    pub fn compute(&self, view: &InstanceView<'_>) -> Value {
        match self {
            IndexKey::Property(name) => view.get(name),
            IndexKey::Derived(generator) => generator(view),
        }
    }

    /// Whether a change to property `key` may change the index key
    fn depends_on(&self, key: &str) -> bool {
        match self {
            IndexKey::Property(name) => name == key,
            IndexKey::Derived(_) => true,
        }
    }
}

impl fmt::Debug for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Property(name) => f.debug_tuple("Property").field(name).finish(),
            IndexKey::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl From<&str> for IndexKey {
    fn from(name: &str) -> Self {
        IndexKey::property(name)
    }
}

/// Hashable bucket key
///
/// Floats compare and hash by bit pattern so every key equals itself.
#[derive(Debug, Clone)]
struct BucketKey(Value);

fn hash_key<H: Hasher>(value: &Value, state: &mut H) {
    std::mem::discriminant(value).hash(state);
    match value {
        Value::Null => {}
        Value::Bool(b) => b.hash(state),
        Value::Int(i) => i.hash(state),
        Value::Float(f) => f.to_bits().hash(state),
        Value::String(s) => s.hash(state),
        Value::Date(d) => d.hash(state),
        Value::Instance(instance) => instance.hash(state),
        Value::List(items) => {
            items.len().hash(state);
            for item in items {
                hash_key(item, state);
            }
        }
    }
}

impl PartialEq for BucketKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.same_as(&other.0)
    }
}

impl Eq for BucketKey {}

impl Hash for BucketKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_key(&self.0, state);
    }
}

/// Members of one bucket, newest first, with a membership mirror
#[derive(Default)]
struct Bucket {
    members: VecDeque<Instance>,
    present: FxHashSet<Instance>,
}

impl Bucket {
    fn insert(&mut self, instance: &Instance) -> bool {
        if self.present.insert(instance.clone()) {
            self.members.push_front(instance.clone());
            true
        } else {
            false
        }
    }

    fn remove(&mut self, instance: &Instance) -> bool {
        if self.present.remove(instance) {
            self.members.retain(|member| member != instance);
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    fn snapshot(&self) -> Vec<Instance> {
        self.members.iter().cloned().collect()
    }
}

/// Whether entries may be physically dropped on behalf of `revision`
///
/// Only the root with no live branch qualifies: no other revision can then
/// hold a value whose bucket the entry belongs to. Must be evaluated while
/// the bucket lock is held, so a branch created concurrently inserts after
/// the removal.
fn prunable(revision: &Revision) -> bool {
    revision.is_root() && revision.live_branches() == 0
}

/// Secondary index over the instances of one model and its extensions
pub struct Index {
    name: String,
    model: ModelId,
    key: IndexKey,
    buckets: Mutex<FxHashMap<BucketKey, Bucket>>,
}

impl Index {
    pub(crate) fn new(name: impl Into<String>, model: ModelId, key: IndexKey) -> Self {
        Self {
            name: name.into(),
            model,
            key,
            buckets: Mutex::new(FxHashMap::default()),
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model whose instances are indexed
    pub fn model_id(&self) -> ModelId {
        self.model
    }

    /// Key generator
    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    /// Add the viewed instance to the bucket of its current key
    pub fn insert(&self, view: &InstanceView<'_>) {
        let key = BucketKey(self.key.compute(view));
        let instance = view.instance();
        if self.buckets.lock().entry(key).or_default().insert(instance) {
            trace!(index = %self.name, %instance, "indexed instance");
        }
    }

    /// Remove the viewed instance from the bucket of its current key
    ///
    /// Must run before the key's inputs change, or the wrong bucket is
    /// searched.
    pub fn remove(&self, view: &InstanceView<'_>) {
        let key = BucketKey(self.key.compute(view));
        let mut buckets = self.buckets.lock();
        Self::remove_from(&mut buckets, &key, view.instance());
    }

    /// Remove the viewed instance from its current bucket if the viewing
    /// revision may prune; otherwise leave the entry for `find` to filter
    fn prune(&self, view: &InstanceView<'_>) {
        let key = BucketKey(self.key.compute(view));
        let mut buckets = self.buckets.lock();
        if prunable(view.revision()) {
            Self::remove_from(&mut buckets, &key, view.instance());
        }
    }

    fn remove_from(
        buckets: &mut FxHashMap<BucketKey, Bucket>,
        key: &BucketKey,
        instance: &Instance,
    ) {
        if let Some(bucket) = buckets.get_mut(key) {
            bucket.remove(instance);
            if bucket.is_empty() {
                buckets.remove(key);
            }
        }
    }

    /// Whether `instance` is visible in `revision` with key `key`
    fn holds(generator: &IndexKey, revision: &Revision, instance: &Instance, key: &Value) -> bool {
        revision.contains(instance)
            && generator
                .compute(&InstanceView::new(revision, instance))
                .same_as(key)
    }

    /// Instances of the indexed model whose key equals `key` in `revision`
    ///
    /// Buckets may hold entries left by other revisions; only members
    /// visible in `revision` with that key there are yielded. When
    /// `revision` is the root with no live branch, stale entries of the
    /// bucket are dropped on the way. Unknown keys yield an empty sequence.
    pub fn find(&self, revision: &Arc<Revision>, key: impl Into<Value>) -> Sequence<Instance> {
        let key = BucketKey(key.into());
        let mut buckets = self.buckets.lock();
        let bucket = match buckets.get_mut(&key) {
            Some(bucket) => bucket,
            None => return sequence::empty(),
        };

        if prunable(revision) {
            let stale: Vec<Instance> = bucket
                .members
                .iter()
                .filter(|member| !Self::holds(&self.key, revision, member, &key.0))
                .cloned()
                .collect();
            for instance in &stale {
                bucket.remove(instance);
            }
            let members = bucket.snapshot();
            if members.is_empty() {
                buckets.remove(&key);
            }
            if !stale.is_empty() {
                debug!(index = %self.name, pruned = stale.len(), "pruned stale index entries");
            }
            return sequence::from_vec(members);
        }

        let members = bucket.snapshot();
        drop(buckets);

        let revision = Arc::clone(revision);
        let generator = self.key.clone();
        Box::new(
            members
                .into_iter()
                .filter(move |instance| Self::holds(&generator, &revision, instance, &key.0)),
        )
    }

    /// Number of non-empty buckets, stale entries included
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl MutationObserver for Index {
    fn on_create(&self, view: &InstanceView<'_>) {
        self.insert(view);
    }

    fn before_set(&self, view: &InstanceView<'_>, key: &str) {
        if self.key.depends_on(key) {
            self.prune(view);
        }
    }

    fn after_set(&self, view: &InstanceView<'_>, key: &str) {
        if self.key.depends_on(key) {
            self.insert(view);
        }
    }

    fn on_delete(&self, view: &InstanceView<'_>) {
        self.prune(view);
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("key", &self.key)
            .field("buckets", &self.bucket_count())
            .finish()
    }
}
