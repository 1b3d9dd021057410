//! Lifecycle collaborator seam
//!
//! The core never stores hooks. It only knows when to ask an owner to run
//! one: before a render watcher runs in a flush, after a flush touched a
//! render watcher, and when a kept-alive component is activated again.

use crate::identity::WatcherId;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Named lifecycle hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hook {
    BeforeCreate,
    Created,
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    Activated,
    Deactivated,
    BeforeDestroy,
    Destroyed,
}

impl Hook {
    /// Hook name as used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Hook::BeforeCreate => "beforeCreate",
            Hook::Created => "created",
            Hook::BeforeMount => "beforeMount",
            Hook::Mounted => "mounted",
            Hook::BeforeUpdate => "beforeUpdate",
            Hook::Updated => "updated",
            Hook::Activated => "activated",
            Hook::Deactivated => "deactivated",
            Hook::BeforeDestroy => "beforeDestroy",
            Hook::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An owner of watchers that exposes lifecycle state and hook invocation
///
/// Implemented by component instances. Watchers hold owners weakly.
pub trait Lifecycle {
    /// Name used in warnings and error reports
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Whether the owner has completed its first render
    fn is_mounted(&self) -> bool;

    /// Whether the owner has been torn down
    fn is_destroyed(&self) -> bool;

    /// Run every handler registered for `hook`
    fn call_hook(&self, hook: Hook);

    /// Called by the scheduler after a flush for owners queued with
    /// [`queue_activated_component`](crate::scheduler::queue_activated_component)
    fn activate(&self) {
        self.call_hook(Hook::Activated);
    }

    /// Parent owner, walked when routing errors
    fn parent(&self) -> Option<Rc<dyn Lifecycle>> {
        None
    }

    /// Forget a watcher this owner listed, after it was torn down
    fn remove_watcher(&self, _id: WatcherId) {}

    /// Offer an error raised by `origin` (this owner or a descendant) to this
    /// owner's capture handlers. Returning `true` stops propagation.
    fn capture_error(&self, _err: &Error, _origin: &dyn Lifecycle, _info: &str) -> bool {
        false
    }
}
