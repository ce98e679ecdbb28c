//! Model Integration Tests
//!
//! Tests for model definition and extension, typed property validation,
//! collection associations and queries.

#[path = "../common/mod.rs"]
mod common;

mod queries;
