//! Dependency objects
//!
//! A [`Dep`] is the subscription point for one tracked field or one tracked
//! container. Watchers register themselves while evaluating and are told to
//! update when the Dep notifies.

use crate::identity::{DepId, WatcherId};
use crate::target;
use crate::watcher::{Watcher, WeakWatcher};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct DepInner {
    id: DepId,
    subs: RefCell<IndexMap<WatcherId, WeakWatcher>>,
}

/// Subscriber set for a single observable slot
///
/// Subscribers are held weakly. A watcher leaves every set it joined when it
/// is torn down or when a re-evaluation stops reading the slot; entries of
/// dropped watchers are pruned on the next notify.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: DepId::next(),
            subs: RefCell::new(IndexMap::new()),
        }))
    }

    pub fn id(&self) -> DepId {
        self.0.id
    }

    /// Register a subscriber. Registering twice has no effect.
    pub fn add_sub(&self, watcher: &Watcher) {
        self.0
            .subs
            .borrow_mut()
            .entry(watcher.id())
            .or_insert_with(|| watcher.downgrade());
    }

    pub fn remove_sub(&self, id: WatcherId) {
        self.0.subs.borrow_mut().shift_remove(&id);
    }

    /// Ask the current target, if any, to depend on this object
    pub fn depend(&self) {
        if let Some(watcher) = target::current() {
            watcher.add_dep(self);
        }
    }

    /// Tell every subscriber its input changed, in ascending id order
    pub fn notify(&self) {
        let mut subs: Vec<Watcher> = {
            let mut entries = self.0.subs.borrow_mut();
            entries.retain(|_, weak| weak.is_alive());
            entries.values().filter_map(WeakWatcher::upgrade).collect()
        };
        subs.sort_by_key(|w| w.id());
        for watcher in subs {
            watcher.update();
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.0.subs.borrow().values().filter(|w| w.is_alive()).count()
    }

    pub fn subscriber_ids(&self) -> Vec<WatcherId> {
        self.0
            .subs
            .borrow()
            .iter()
            .filter(|(_, w)| w.is_alive())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.0.subs.borrow().get(&id).is_some_and(WeakWatcher::is_alive)
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subs", &self.subscriber_ids())
            .finish()
    }
}
