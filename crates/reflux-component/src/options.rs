//! Component definitions
//!
//! A [`ComponentOptions`] value describes a component: where its state comes
//! from, what it derives, what it watches, how it renders and which hooks
//! run. Instances are created from it with
//! [`Instance::new`](crate::Instance::new).

use crate::instance::Instance;
use crate::vnode::VNode;
use indexmap::IndexMap;
use reflux_core::{Error, Hook, Lifecycle, Map, Result, Value, WatchOptions};
use std::collections::HashMap;
use std::rc::Rc;

/// Produces a fresh root data map for each instance
pub type DataFn = Rc<dyn Fn() -> Map>;

/// Derives a value from instance state
pub type ComputedFn = Rc<dyn Fn(&Instance) -> Result<Value>>;

/// Reacts to a watched path changing: `(instance, new, old)`
pub type WatchFn = Rc<dyn Fn(&Instance, &Value, &Value) -> Result<()>>;

/// Produces the output tree from instance state
pub type RenderFn = Rc<dyn Fn(&Instance) -> Result<VNode>>;

pub type HookFn = Rc<dyn Fn(&Instance) -> Result<()>>;

/// Receives `(error, origin, info)` raised by a descendant; returning
/// `true` stops further propagation
pub type ErrorCapturedFn = Rc<dyn Fn(&Error, &dyn Lifecycle, &str) -> bool>;

/// A watch declared in the options
#[derive(Clone)]
pub struct WatchEntry {
    pub path: String,
    pub handler: WatchFn,
    pub options: WatchOptions,
}

/// Definition of a component
#[derive(Clone, Default)]
pub struct ComponentOptions {
    pub(crate) name: Option<String>,
    pub(crate) data: Option<DataFn>,
    pub(crate) computed: IndexMap<String, ComputedFn>,
    pub(crate) watch: Vec<WatchEntry>,
    pub(crate) render: Option<RenderFn>,
    pub(crate) hooks: HashMap<Hook, Vec<HookFn>>,
    pub(crate) error_captured: Vec<ErrorCapturedFn>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name used in warnings and error reports
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn data(mut self, data: impl Fn() -> Map + 'static) -> Self {
        self.data = Some(Rc::new(data));
        self
    }

    /// Declare a computed property; declaration order is creation order
    pub fn computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&Instance) -> Result<Value> + 'static,
    ) -> Self {
        self.computed.insert(name.into(), Rc::new(getter));
        self
    }

    /// Watch a dot-delimited path of the instance
    pub fn watch(
        self,
        path: impl Into<String>,
        handler: impl Fn(&Instance, &Value, &Value) -> Result<()> + 'static,
    ) -> Self {
        self.watch_with(path, WatchOptions::default(), handler)
    }

    pub fn watch_with(
        mut self,
        path: impl Into<String>,
        options: WatchOptions,
        handler: impl Fn(&Instance, &Value, &Value) -> Result<()> + 'static,
    ) -> Self {
        self.watch.push(WatchEntry {
            path: path.into(),
            handler: Rc::new(handler),
            options,
        });
        self
    }

    pub fn render(mut self, render: impl Fn(&Instance) -> Result<VNode> + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    /// Add a handler for a lifecycle hook; several handlers run in order
    pub fn hook(mut self, hook: Hook, handler: impl Fn(&Instance) -> Result<()> + 'static) -> Self {
        self.hooks.entry(hook).or_default().push(Rc::new(handler));
        self
    }

    pub fn error_captured(
        mut self,
        handler: impl Fn(&Error, &dyn Lifecycle, &str) -> bool + 'static,
    ) -> Self {
        self.error_captured.push(Rc::new(handler));
        self
    }

    pub(crate) fn hook_handlers(&self, hook: Hook) -> Vec<HookFn> {
        self.hooks.get(&hook).cloned().unwrap_or_default()
    }
}
