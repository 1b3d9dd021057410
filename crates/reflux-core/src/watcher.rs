//! Watchers: units of work that re-run when what they read changes
//!
//! A watcher evaluates its getter with itself as the current target, so
//! every tracked read made by the getter subscribes it. Each evaluation
//! records a fresh dependency set and drops subscriptions that were not
//! read again.

use crate::dep::Dep;
use crate::handler::handle_error;
use crate::identity::{DepId, WatcherId};
use crate::lifecycle::Lifecycle;
use crate::observer::traverse;
use crate::scheduler::queue_watcher;
use crate::target::TargetGuard;
use crate::value::Value;
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Produces the watched value
pub type Getter = Rc<dyn Fn() -> Result<Value>>;

/// Receives `(new, old)` when the watched value changes
pub type Callback = Rc<dyn Fn(&Value, &Value) -> Result<()>>;

/// Runs right before the watcher is run by a flush
pub type BeforeHook = Rc<dyn Fn()>;

/// Behavior flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherOptions {
    /// Evaluate on demand only (computed values)
    pub lazy: bool,
    /// Created by user code; errors are routed instead of returned
    pub user: bool,
    /// Depend on everything reachable from the value
    pub deep: bool,
    /// Run immediately on change instead of in a flush
    pub sync: bool,
    /// Drives an owner's render
    pub render: bool,
}

struct WatcherInner {
    id: WatcherId,
    expression: String,
    options: WatcherOptions,
    getter: Getter,
    callback: Option<Callback>,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn Lifecycle>>,
    active: Cell<bool>,
    dirty: Cell<bool>,
    value: RefCell<Value>,
    deps: RefCell<IndexMap<DepId, Dep>>,
    new_deps: RefCell<IndexMap<DepId, Dep>>,
}

/// Shared handle to a watcher
///
/// Dependencies only hold watchers weakly; a watcher lives as long as some
/// handle to it does.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

/// Non-owning reference held in subscriber sets
#[derive(Clone)]
pub(crate) struct WeakWatcher(Weak<WatcherInner>);

impl WeakWatcher {
    pub(crate) fn upgrade(&self) -> Option<Watcher> {
        self.0.upgrade().map(Watcher)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl Watcher {
    /// Start building a watcher around `getter`
    pub fn builder(getter: impl Fn() -> Result<Value> + 'static) -> WatcherBuilder {
        WatcherBuilder::new(Rc::new(getter))
    }

    pub fn id(&self) -> WatcherId {
        self.0.id
    }

    pub fn expression(&self) -> &str {
        &self.0.expression
    }

    pub fn options(&self) -> WatcherOptions {
        self.0.options
    }

    pub fn is_lazy(&self) -> bool {
        self.0.options.lazy
    }

    pub fn is_user(&self) -> bool {
        self.0.options.user
    }

    pub fn is_render(&self) -> bool {
        self.0.options.render
    }

    /// False once torn down
    pub fn is_active(&self) -> bool {
        self.0.active.get()
    }

    /// Lazy watchers only: whether an input changed since the last evaluation
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    /// Last stored value
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Owner, if it is still alive
    pub fn owner(&self) -> Option<Rc<dyn Lifecycle>> {
        self.0.owner.as_ref().and_then(Weak::upgrade)
    }

    /// Ids of the dependencies recorded by the last evaluation
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.0.deps.borrow().keys().copied().collect()
    }

    /// Evaluate the getter and re-collect dependencies
    pub fn get(&self) -> Result<Value> {
        let result = {
            let _guard = TargetGuard::push(Some(self.clone()));
            let getter = self.0.getter.clone();
            let result = match getter() {
                Ok(value) => Ok(value),
                Err(err) if self.0.options.user => {
                    let owner = self.owner();
                    let info = format!("getter for watcher \"{}\"", self.0.expression);
                    handle_error(err, owner.as_deref(), &info).map(|()| self.value())
                }
                Err(err) => Err(err),
            };
            if self.0.options.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();
        result
    }

    /// Record a dependency read during the current evaluation
    pub(crate) fn add_dep(&self, dep: &Dep) {
        if !self.0.active.get() {
            return;
        }
        let id = dep.id();
        let fresh = {
            let mut new_deps = self.0.new_deps.borrow_mut();
            if new_deps.contains_key(&id) {
                false
            } else {
                new_deps.insert(id, dep.clone());
                true
            }
        };
        if fresh && !self.0.deps.borrow().contains_key(&id) {
            dep.add_sub(self);
        }
    }

    fn cleanup_deps(&self) {
        let old = self.0.deps.take();
        let current = self.0.new_deps.take();
        for (id, dep) in &old {
            if !current.contains_key(id) {
                dep.remove_sub(self.0.id);
            }
        }
        *self.0.deps.borrow_mut() = current;
    }

    /// React to a change in one of the dependencies
    pub fn update(&self) {
        if self.0.options.lazy {
            self.0.dirty.set(true);
        } else if self.0.options.sync {
            let Err(err) = self.run() else {
                return;
            };
            // User watchers already routed their own failure
            let result = if self.0.options.user {
                Err(err)
            } else {
                let owner = self.owner();
                let info = format!("watcher \"{}\"", self.0.expression);
                handle_error(err, owner.as_deref(), &info)
            };
            if let Err(err) = result {
                tracing::error!(watcher = %self.0.id, expression = %self.0.expression, error = %err, "sync watcher failed");
            }
        } else {
            queue_watcher(self);
        }
    }

    /// Re-evaluate and invoke the callback if the value changed
    ///
    /// Structured values and deep watchers always invoke the callback, since
    /// the contents may have changed under the same handle.
    pub fn run(&self) -> Result<()> {
        if !self.0.active.get() {
            return Ok(());
        }
        let value = self.get()?;
        let old = self.value();
        if !value.same(&old) || value.is_structured() || self.0.options.deep {
            *self.0.value.borrow_mut() = value.clone();
            if let Some(callback) = self.0.callback.clone() {
                match callback(&value, &old) {
                    Ok(()) => {}
                    Err(err) if self.0.options.user => {
                        let owner = self.owner();
                        let info = format!("callback for watcher \"{}\"", self.0.expression);
                        handle_error(err, owner.as_deref(), &info)?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Recompute a lazy watcher and clear its dirty flag
    pub fn evaluate(&self) -> Result<()> {
        let value = self.get()?;
        *self.0.value.borrow_mut() = value;
        self.0.dirty.set(false);
        Ok(())
    }

    /// Make the current target depend on everything this watcher depends on
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.0.deps.borrow().values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    pub(crate) fn call_before(&self) {
        if let Some(before) = self.0.before.clone() {
            before();
        }
    }

    /// Unsubscribe from every dependency; the watcher never runs again
    pub fn teardown(&self) {
        if !self.0.active.get() {
            return;
        }
        let deps = self.0.deps.take();
        for dep in deps.values() {
            dep.remove_sub(self.0.id);
        }
        self.0.new_deps.borrow_mut().clear();
        self.0.active.set(false);
        if let Some(owner) = self.owner() {
            owner.remove_watcher(self.0.id);
        }
        tracing::trace!(watcher = %self.0.id, "watcher torn down");
    }

    pub fn ptr_eq(&self, other: &Watcher) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakWatcher {
        WeakWatcher(Rc::downgrade(&self.0))
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("expression", &self.0.expression)
            .field("options", &self.0.options)
            .field("active", &self.0.active.get())
            .finish()
    }
}

/// Builder for [`Watcher`]
pub struct WatcherBuilder {
    getter: Getter,
    expression: String,
    callback: Option<Callback>,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn Lifecycle>>,
    options: WatcherOptions,
}

impl WatcherBuilder {
    fn new(getter: Getter) -> Self {
        Self {
            getter,
            expression: String::new(),
            callback: None,
            before: None,
            owner: None,
            options: WatcherOptions::default(),
        }
    }

    /// Text shown in diagnostics
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn callback(mut self, callback: impl Fn(&Value, &Value) -> Result<()> + 'static) -> Self {
        self.callback = Some(Rc::new(callback));
        self
    }

    pub fn before(mut self, before: impl Fn() + 'static) -> Self {
        self.before = Some(Rc::new(before));
        self
    }

    pub fn owner(mut self, owner: Weak<dyn Lifecycle>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn options(mut self, options: WatcherOptions) -> Self {
        self.options = options;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.options.lazy = lazy;
        self
    }

    pub fn user(mut self, user: bool) -> Self {
        self.options.user = user;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.options.deep = deep;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.options.sync = sync;
        self
    }

    pub fn render(mut self, render: bool) -> Self {
        self.options.render = render;
        self
    }

    /// Allocate the watcher without evaluating it
    pub(crate) fn into_watcher(self) -> Watcher {
        Watcher(Rc::new(WatcherInner {
            id: WatcherId::next(),
            expression: self.expression,
            options: self.options,
            getter: self.getter,
            callback: self.callback,
            before: self.before,
            owner: self.owner,
            active: Cell::new(true),
            dirty: Cell::new(self.options.lazy),
            value: RefCell::new(Value::Null),
            deps: RefCell::new(IndexMap::new()),
            new_deps: RefCell::new(IndexMap::new()),
        }))
    }

    /// Create the watcher, evaluating it once unless it is lazy
    pub fn build(self) -> Result<Watcher> {
        let watcher = self.into_watcher();
        if !watcher.is_lazy() {
            match watcher.get() {
                Ok(value) => *watcher.0.value.borrow_mut() = value,
                Err(err) => {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        Ok(watcher)
    }
}
