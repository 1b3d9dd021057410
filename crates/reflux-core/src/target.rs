//! The active-subscriber stack
//!
//! The top of the stack is the watcher that reads are attributed to. A
//! `None` entry suspends tracking for the code running above it.

use crate::watcher::Watcher;
use std::cell::RefCell;

thread_local! {
    static STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// The watcher currently collecting dependencies
pub fn current() -> Option<Watcher> {
    STACK.with(|s| s.borrow().last().cloned().flatten())
}

/// Whether reads right now would be recorded
pub fn is_tracking() -> bool {
    STACK.with(|s| matches!(s.borrow().last(), Some(Some(_))))
}

/// Number of entries on the stack
pub fn depth() -> usize {
    STACK.with(|s| s.borrow().len())
}

/// Scoped stack entry; popped when dropped
#[must_use = "the target is popped as soon as the guard is dropped"]
pub struct TargetGuard {
    _private: (),
}

impl TargetGuard {
    /// Make `watcher` the current target
    pub fn push(watcher: Option<Watcher>) -> Self {
        STACK.with(|s| s.borrow_mut().push(watcher));
        Self { _private: () }
    }

    /// Suspend tracking until the guard is dropped
    pub fn suspend() -> Self {
        Self::push(None)
    }
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        STACK.with(|s| {
            s.borrow_mut().pop();
        });
    }
}

/// Run `f` without attributing its reads to any watcher
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = TargetGuard::suspend();
    f()
}

pub(crate) fn reset() {
    STACK.with(|s| s.borrow_mut().clear());
}
