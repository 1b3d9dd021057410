//! Runtime-wide switches and reset
//!
//! All reactive state is thread-local. [`reset`] returns the current thread
//! to a clean runtime: empty scheduler queue, no pending ticks, empty target
//! stack, default configuration.

use std::cell::Cell;

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable wrapping of newly observed containers
///
/// While disabled, [`observe`](crate::observe) leaves untracked containers
/// untracked. Already tracked containers are unaffected.
pub fn toggle_observing(value: bool) {
    SHOULD_OBSERVE.with(|s| s.set(value));
}

pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(|s| s.get())
}

/// Reset every piece of thread-local runtime state
pub fn reset() {
    crate::scheduler::reset();
    crate::next_tick::reset();
    crate::target::reset();
    crate::config::reset();
    toggle_observing(true);
    tracing::trace!("reactive runtime reset");
}
