//! Transaction coordinator
//!
//! Wraps revision commit with lifecycle bookkeeping:
//! - Active transaction tracking
//! - Transaction metrics (started, committed, conflicted, aborted)
//! - Commit rate calculation

use nodb_concurrency::{CommitError, CommitStats, Revision};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Transaction coordinator for a store
///
/// # Memory Ordering
///
/// The counters are purely observational and use Relaxed ordering; they
/// synchronize nothing else.
#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    /// Transactions currently running
    active_count: AtomicU64,
    /// Transactions started (retries are not counted again)
    total_started: AtomicU64,
    /// Transactions committed
    total_committed: AtomicU64,
    /// Commit attempts that hit a conflict
    total_conflicts: AtomicU64,
    /// Transactions abandoned (failing work or exhausted retries)
    total_aborted: AtomicU64,
}

impl TransactionCoordinator {
    /// Create a coordinator with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record transaction start
    pub fn record_start(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Commit a branch into its parent, recording a conflict on failure
    ///
    /// The transaction stays active after a conflict; the caller either
    /// retries or records an abort.
    pub fn commit(&self, branch: &Revision) -> Result<CommitStats, CommitError> {
        match branch.commit() {
            Ok(stats) => {
                self.record_commit();
                debug!(target: "nodb::txn", revision = %branch.id(), "Transaction committed");
                Ok(stats)
            }
            Err(e) => {
                if matches!(e, CommitError::Conflict(_)) {
                    self.total_conflicts.fetch_add(1, Ordering::Relaxed);
                }
                warn!(target: "nodb::txn", revision = %branch.id(), error = %e, "Commit failed");
                Err(e)
            }
        }
    }

    /// Record transaction commit
    pub fn record_commit(&self) {
        self.finish();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction abort
    pub fn record_abort(&self) {
        self.finish();
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self) {
        // Saturating decrement
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    /// Get current active transaction count
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::Relaxed)
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: started,
            total_committed: committed,
            total_conflicts: self.total_conflicts.load(Ordering::Relaxed),
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }
}

/// Transaction metrics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionMetrics {
    /// Number of currently running transactions
    pub active_count: u64,
    /// Total number of transactions started
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of conflicting commit attempts
    pub total_conflicts: u64,
    /// Total number of transactions abandoned
    pub total_aborted: u64,
    /// Committed / started (0.0 when nothing started)
    pub commit_rate: f64,
}

impl TransactionMetrics {
    /// Transactions that have finished either way
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_aborted
    }
}
