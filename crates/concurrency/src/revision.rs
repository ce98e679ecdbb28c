//! Revisions: copy-on-write overlays for nested transactions
//!
//! A [`Revision`] is one node of a branch tree. The root holds the
//! committed state; every other revision is an overlay of pending
//! creates, deletes, reads and writes on top of its parent.
//!
//! # Read path
//!
//! `get_value_for` walks from the revision up through its ancestors. In
//! each overlay a pending write wins over a recorded read. The first hit
//! is authoritative. When the hit came from an ancestor, the value is
//! recorded in this revision's read set (first read wins) so that commit
//! can detect a divergence.
//!
//! # Lifecycle
//!
//! 1. **BRANCH**: `branch()` creates an empty overlay on top of `self`
//! 2. **WORK**: reads, writes, creates and deletes accumulate in the overlay
//! 3. **COMMIT/REVERT**: `commit()` validates the read set against the
//!    parent and folds the overlay into it; `revert()` discards it.
//!    Either way the overlay is left empty.
//!
//! The root revision can neither commit nor revert.
//!
//! # Concurrency
//!
//! Commits into the same parent are serialized by the parent's commit
//! lock, held from validation until the overlay is applied. A sibling can
//! therefore never apply between another commit's validation and its
//! apply.

use crate::current::CurrentGuard;
use crate::validation::{validate_reads, ValidationResult};
use nodb_core::{Error, Instance, RevisionId, Sequence, Value};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Values observed per instance, keyed by property name
///
/// `None` records that the property was absent when read.
pub type ReadSet = FxHashMap<Instance, FxHashMap<String, Option<Value>>>;

/// Pending values per instance, keyed by property name
pub type WriteSet = FxHashMap<Instance, FxHashMap<String, Value>>;

/// Error type for commit and revert failures
#[derive(Debug, Clone, PartialEq)]
pub enum CommitError {
    /// Commit aborted because recorded reads diverged from the parent
    ///
    /// Nothing was applied to the parent.
    Conflict(ValidationResult),

    /// Commit or revert was called on the root revision
    RootRevision(&'static str),
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::Conflict(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::RootRevision(op) => write!(f, "Cannot {} the root revision", op),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::Conflict(result) => Error::CommitConflict {
                conflicts: result.conflict_count(),
            },
            CommitError::RootRevision(operation) => Error::RootRevision { operation },
        }
    }
}

/// Counts of what a successful commit folded into the parent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Read entries propagated to the parent
    pub reads_propagated: usize,
    /// Write entries applied to the parent
    pub writes_applied: usize,
    /// Instances created
    pub created: usize,
    /// Instances deleted
    pub deleted: usize,
}

/// Summary of the pending contents of an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of recorded (instance, key) reads
    pub reads: usize,
    /// Number of pending (instance, key) writes
    pub writes: usize,
    /// Number of instances created in this overlay
    pub created: usize,
    /// Number of instances deleted in this overlay
    pub deleted: usize,
}

impl PendingOperations {
    /// Total number of pending entries
    pub fn total(&self) -> usize {
        self.reads + self.writes + self.created + self.deleted
    }

    /// Check if the overlay is empty
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

#[derive(Default)]
struct Overlay {
    /// Instances introduced here, in creation order
    created: Vec<Instance>,
    /// Membership mirror of `created`
    created_set: FxHashSet<Instance>,
    /// Instances removed here that were created by an ancestor
    deleted: FxHashSet<Instance>,
    reads: ReadSet,
    writes: WriteSet,
}

impl Overlay {
    /// Authoritative entry for (instance, key) in this overlay, if any
    ///
    /// Outer `None`: this overlay says nothing. Inner `None`: recorded absent.
    fn lookup(&self, instance: &Instance, key: &str) -> Option<Option<Value>> {
        if let Some(value) = self.writes.get(instance).and_then(|values| values.get(key)) {
            return Some(Some(value.clone()));
        }
        self.reads
            .get(instance)
            .and_then(|values| values.get(key))
            .cloned()
    }

    fn owns(&self, instance: &Instance, key: &str) -> bool {
        self.writes
            .get(instance)
            .map_or(false, |values| values.contains_key(key))
            || self
                .reads
                .get(instance)
                .map_or(false, |values| values.contains_key(key))
    }

    fn add(&mut self, instance: Instance) {
        if self.created_set.insert(instance.clone()) {
            self.created.push(instance);
        }
    }

    fn remove(&mut self, instance: &Instance) {
        if self.created_set.remove(instance) {
            self.created.retain(|i| i != instance);
        } else {
            self.deleted.insert(instance.clone());
        }
    }

    fn pending(&self) -> PendingOperations {
        PendingOperations {
            reads: self.reads.values().map(|v| v.len()).sum(),
            writes: self.writes.values().map(|v| v.len()).sum(),
            created: self.created.len(),
            deleted: self.deleted.len(),
        }
    }
}

/// One node of the revision tree
pub struct Revision {
    id: RevisionId,
    parent: Option<Arc<Revision>>,
    depth: usize,
    overlay: Mutex<Overlay>,
    /// Children not yet dropped
    branches: AtomicUsize,
    /// Held by a child across validate and apply
    commit_lock: Mutex<()>,
}

impl Revision {
    /// Create a root revision (the committed state)
    pub fn new_root() -> Arc<Self> {
        Arc::new(Revision {
            id: RevisionId::new(),
            parent: None,
            depth: 0,
            overlay: Mutex::new(Overlay::default()),
            branches: AtomicUsize::new(0),
            commit_lock: Mutex::new(()),
        })
    }

    /// Create an empty overlay whose parent is `self`
    pub fn branch(self: &Arc<Self>) -> Arc<Revision> {
        let child = Arc::new(Revision {
            id: RevisionId::new(),
            parent: Some(Arc::clone(self)),
            depth: self.depth + 1,
            overlay: Mutex::new(Overlay::default()),
            branches: AtomicUsize::new(0),
            commit_lock: Mutex::new(()),
        });
        self.branches.fetch_add(1, Ordering::SeqCst);
        trace!(parent = %self.id, revision = %child.id, depth = child.depth, "branched revision");
        child
    }

    /// Run `work` with this revision installed as the thread's current revision
    ///
    /// The previous current revision is restored when `work` returns or
    /// unwinds.
    pub fn enter<T>(self: &Arc<Self>, work: impl FnOnce(&Arc<Revision>) -> T) -> T {
        let _guard = CurrentGuard::install(Arc::clone(self));
        work(self)
    }

    /// Unique id of this revision
    pub fn id(&self) -> RevisionId {
        self.id
    }

    /// Parent revision (`None` for the root)
    pub fn parent(&self) -> Option<&Arc<Revision>> {
        self.parent.as_ref()
    }

    /// Number of ancestors
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Check if this is the root revision
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of direct children that are still alive
    ///
    /// A child stays alive (and counted) after commit or revert until its
    /// last handle is dropped.
    pub fn live_branches(&self) -> usize {
        self.branches.load(Ordering::SeqCst)
    }

    /// Walk from `self` to the root and return the first authoritative entry
    ///
    /// The bool is true when the entry was found in `self`.
    fn resolve(&self, instance: &Instance, key: &str) -> (Option<Option<Value>>, bool) {
        let mut current = Some(self);
        let mut own = true;
        while let Some(revision) = current {
            if let Some(found) = revision.overlay.lock().lookup(instance, key) {
                return (Some(found), own);
            }
            own = false;
            current = revision.parent.as_deref();
        }
        (None, false)
    }

    /// Read a property value through this revision
    ///
    /// Values found in an ancestor are recorded in this revision's read
    /// set unless an entry for (instance, key) is already there. Returns
    /// `None` when no revision in the chain holds a value.
    pub fn get_value_for(&self, instance: &Instance, key: &str) -> Option<Value> {
        let (found, own) = self.resolve(instance, key);
        if own {
            return found.flatten();
        }

        let value = found.flatten();
        // The root never commits, so it has nothing to validate against.
        if !self.is_root() {
            let mut overlay = self.overlay.lock();
            let recorded = overlay
                .reads
                .entry(instance.clone())
                .or_default()
                .entry(key.to_string())
                .or_insert_with(|| value.clone());
            trace!(revision = %self.id, %instance, key, recorded = ?recorded, "recorded read");
        }
        value
    }

    /// Read a property value without recording a read
    ///
    /// Used for derived data (index keys) and for commit validation.
    pub fn peek_value_for(&self, instance: &Instance, key: &str) -> Option<Value> {
        self.resolve(instance, key).0.flatten()
    }

    /// Store a pending value, replacing any earlier pending write in this overlay
    pub fn set_value_for(&self, instance: &Instance, key: &str, value: Value) {
        self.overlay
            .lock()
            .writes
            .entry(instance.clone())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Register a newly created instance in this overlay
    pub fn add(&self, instance: Instance) {
        self.overlay.lock().add(instance);
    }

    /// Remove an instance
    ///
    /// An instance created in this same overlay disappears without trace;
    /// otherwise the removal is recorded as a delete.
    pub fn remove(&self, instance: &Instance) {
        self.overlay.lock().remove(instance);
    }

    /// Check whether `instance` is visible through this revision
    pub fn contains(&self, instance: &Instance) -> bool {
        let mut current = Some(self);
        while let Some(revision) = current {
            let overlay = revision.overlay.lock();
            if overlay.deleted.contains(instance) {
                return false;
            }
            if overlay.created_set.contains(instance) {
                return true;
            }
            drop(overlay);
            current = revision.parent.as_deref();
        }
        false
    }

    /// Every instance visible through this revision
    ///
    /// Yields this overlay's created instances, then the parent's visible
    /// instances, excluding anything deleted in this overlay. The parent
    /// is consulted lazily, on first pull past the local instances.
    pub fn iterator(&self) -> Sequence<Instance> {
        let (created, deleted) = {
            let overlay = self.overlay.lock();
            (overlay.created.clone(), overlay.deleted.clone())
        };
        let parent = self.parent.clone();
        Box::new(
            created
                .into_iter()
                .chain(parent.into_iter().flat_map(|p| p.iterator()))
                .filter(move |instance| !deleted.contains(instance)),
        )
    }

    /// Every instance with pending state in this overlay
    ///
    /// Covers written, created and deleted instances; used to repair
    /// derived structures before the overlay is discarded.
    pub fn touched(&self) -> Vec<Instance> {
        let overlay = self.overlay.lock();
        let mut seen: FxHashSet<Instance> = FxHashSet::default();
        overlay
            .writes
            .keys()
            .chain(overlay.created.iter())
            .chain(overlay.deleted.iter())
            .filter(|instance| seen.insert((*instance).clone()))
            .cloned()
            .collect()
    }

    /// Instances created in this overlay, in creation order
    pub fn created(&self) -> Vec<Instance> {
        self.overlay.lock().created.clone()
    }

    /// Summary of pending entries
    pub fn pending_operations(&self) -> PendingOperations {
        self.overlay.lock().pending()
    }

    /// Validate and fold this overlay into its parent
    ///
    /// 1. Every recorded read is compared with the parent's current value;
    ///    any divergence aborts with `CommitError::Conflict` and leaves both
    ///    revisions untouched.
    /// 2. Reads the parent does not already own are propagated to the
    ///    parent's read set, so the parent's own commit is validated
    ///    against them.
    /// 3. Writes overwrite the parent's pending values; creates and
    ///    deletes are replayed on the parent.
    /// 4. The overlay is cleared.
    pub fn commit(&self) -> Result<CommitStats, CommitError> {
        let parent = self.parent.as_ref().ok_or(CommitError::RootRevision("commit"))?;
        let _commit = parent.commit_lock.lock();

        let mut overlay = self.overlay.lock();

        let validation = validate_reads(&overlay.reads, parent);
        if !validation.is_valid() {
            warn!(
                revision = %self.id,
                parent = %parent.id,
                conflicts = validation.conflict_count(),
                "commit conflict"
            );
            return Err(CommitError::Conflict(validation));
        }

        let state = std::mem::take(&mut *overlay);
        drop(overlay);

        let mut stats = CommitStats {
            created: state.created.len(),
            deleted: state.deleted.len(),
            ..CommitStats::default()
        };

        let mut target = parent.overlay.lock();

        if !parent.is_root() {
            for (instance, values) in state.reads {
                for (key, value) in values {
                    if target.owns(&instance, &key) {
                        continue;
                    }
                    target
                        .reads
                        .entry(instance.clone())
                        .or_default()
                        .insert(key, value);
                    stats.reads_propagated += 1;
                }
            }
        }

        for (instance, values) in state.writes {
            stats.writes_applied += values.len();
            target.writes.entry(instance).or_default().extend(values);
        }

        for instance in state.created {
            target.add(instance);
        }
        for instance in &state.deleted {
            target.remove(instance);
        }

        debug!(
            revision = %self.id,
            parent = %parent.id,
            writes = stats.writes_applied,
            reads = stats.reads_propagated,
            created = stats.created,
            deleted = stats.deleted,
            "committed revision"
        );
        Ok(stats)
    }

    /// Discard every pending entry of this overlay
    pub fn revert(&self) -> Result<(), CommitError> {
        if self.is_root() {
            return Err(CommitError::RootRevision("revert"));
        }
        let discarded = std::mem::take(&mut *self.overlay.lock());
        debug!(revision = %self.id, pending = discarded.pending().total(), "reverted revision");
        Ok(())
    }
}

impl Drop for Revision {
    fn drop(&mut self) {
        if let Some(parent) = &self.parent {
            parent.branches.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revision")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("pending", &self.pending_operations())
            .finish()
    }
}
