//! Index Integration Tests
//!
//! Tests for secondary indexes: derived and property keys, two-phase
//! maintenance, and consistency across committed and discarded branches.

#[path = "../common/mod.rs"]
mod common;

mod index_lookup;
