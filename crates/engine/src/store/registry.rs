//! Process-wide store
//!
//! Most applications hold a single store. [`Store::global`] lazily creates
//! one with the default configuration the first time it is asked for.
//!
//! [`Store::global`]: super::Store::global

use once_cell::sync::Lazy;

use super::Store;

/// The global store
pub(super) static GLOBAL_STORE: Lazy<Store> = Lazy::new(Store::new);
