//! Transaction Integration Tests
//!
//! Tests for the store's retrying transaction driver: commit to the root,
//! nested transactions, conflict retry and failing work.

#[path = "../common/mod.rs"]
mod common;

mod nested_transactions;
mod transaction_lifecycle;
