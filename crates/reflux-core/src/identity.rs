//! Identity types for dependencies and watchers
//!
//! Both ids are allocated from monotonic counters. Watcher ids double as the
//! scheduling order: a watcher created earlier always runs earlier in a flush.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DEP_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_WATCHER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a dependency object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DepId(pub u64);

impl DepId {
    /// Allocate the next dependency ID
    pub fn next() -> Self {
        Self(NEXT_DEP_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep:{}", self.0)
    }
}

/// Unique identifier for a watcher
///
/// Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatcherId(pub u64);

impl WatcherId {
    /// Allocate the next watcher ID
    pub fn next() -> Self {
        Self(NEXT_WATCHER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher:{}", self.0)
    }
}
