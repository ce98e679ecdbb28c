//! The thread's current revision
//!
//! Each thread has at most one current revision. [`Revision::enter`]
//! installs one for the duration of a closure; nested `enter` calls stack,
//! and the previous revision is restored even if the closure unwinds.
//!
//! [`Revision::enter`]: crate::revision::Revision::enter

use crate::revision::Revision;
use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<Revision>>> = const { RefCell::new(None) };
}

/// The revision installed on this thread, if any
pub fn current() -> Option<Arc<Revision>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Restores the previously installed revision on drop
pub(crate) struct CurrentGuard {
    previous: Option<Arc<Revision>>,
}

impl CurrentGuard {
    pub(crate) fn install(revision: Arc<Revision>) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(revision)));
        CurrentGuard { previous }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}
