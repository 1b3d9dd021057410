//! Public entry points: reactive key insertion and removal, watches, and
//! computed values

use crate::config::warn;
use crate::handler::handle_error;
use crate::lifecycle::Lifecycle;
use crate::observer::define_reactive;
use crate::target;
use crate::value::{Map, Value};
use crate::watcher::{Getter, Watcher, WatcherBuilder};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::{Rc, Weak};

/// Key into a container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Field(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Field(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Field(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Field(s)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

/// Set a key on a container, making it reactive if the key is new
///
/// On a list, an index past the end extends the list with nulls. On a
/// tracked map, a new key gets its own dependency and readers of the map's
/// structure are notified. Keys cannot be added to component root data.
/// Returns the value that was set.
pub fn set(target: &Value, key: impl Into<Key>, value: impl Into<Value>) -> Value {
    let key = key.into();
    let value = value.into();
    match (target, key) {
        (Value::List(list), Key::Index(index)) => {
            list.set_index(index, value.clone());
        }
        (Value::List(_), Key::Field(name)) => {
            warn(&format!("Cannot set non-index key \"{}\" on a list", name), None);
        }
        (Value::Map(map), key) => set_field(map, key.to_string(), value.clone()),
        (other, key) => warn(
            &format!(
                "Cannot set reactive property \"{}\" on a primitive value: {}",
                key, other
            ),
            None,
        ),
    }
    value
}

fn set_field(map: &Map, key: String, value: Value) {
    if map.peek(&key).is_some() {
        map.set(key, value);
        return;
    }
    let observer = map.observer();
    if observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
        warn(
            "Avoid adding reactive properties to a component's root data at runtime - declare it upfront in the data option",
            None,
        );
        return;
    }
    match observer {
        None => map.set(key, value),
        Some(ob) => {
            map.insert_plain(key.clone(), value);
            define_reactive(map, &key);
            ob.dep().notify();
        }
    }
}

/// Remove a key from a container, notifying readers of its structure
///
/// Returns the removed value. Keys cannot be removed from component root
/// data.
pub fn delete(target: &Value, key: impl Into<Key>) -> Option<Value> {
    match (target, key.into()) {
        (Value::List(list), Key::Index(index)) => {
            if index >= list.peek_len() {
                warn(
                    &format!("Cannot delete index {} of a list of length {}", index, list.peek_len()),
                    None,
                );
                return None;
            }
            list.splice(index, 1, Vec::new()).into_iter().next()
        }
        (Value::List(_), Key::Field(name)) => {
            warn(&format!("Cannot delete non-index key \"{}\" from a list", name), None);
            None
        }
        (Value::Map(map), key) => {
            let observer = map.observer();
            if observer.as_ref().is_some_and(|ob| ob.root_count() > 0) {
                warn(
                    "Avoid deleting properties on a component's root data - just set it to null",
                    None,
                );
                return None;
            }
            if map.is_frozen() {
                warn(&format!("Cannot delete \"{}\" from a frozen map", key), None);
                return None;
            }
            let removed = map.remove_field(&key.to_string())?;
            if let Some(ob) = observer {
                ob.dep().notify();
            }
            Some(removed)
        }
        (other, key) => {
            warn(
                &format!(
                    "Cannot delete reactive property \"{}\" on a primitive value: {}",
                    key, other
                ),
                None,
            );
            None
        }
    }
}

/// Options for user watches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Fire on changes anywhere inside the watched value
    pub deep: bool,
    /// Invoke the callback once right away with the current value
    pub immediate: bool,
    /// Run on change instead of in the next flush
    pub sync: bool,
}

/// A running user watch
#[derive(Debug, Clone)]
pub struct WatchHandle {
    watcher: Watcher,
}

impl WatchHandle {
    /// Stop watching
    pub fn cancel(&self) {
        self.watcher.teardown();
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    /// Current watched value
    pub fn value(&self) -> Value {
        self.watcher.value()
    }
}

/// Builder for a user watch
pub struct Watch {
    getter: Getter,
    expression: String,
    options: WatchOptions,
    owner: Option<Weak<dyn Lifecycle>>,
}

impl Watch {
    /// Watch the result of a function
    pub fn new(getter: impl Fn() -> Result<Value> + 'static) -> Self {
        Self {
            getter: Rc::new(getter),
            expression: String::new(),
            options: WatchOptions::default(),
            owner: None,
        }
    }

    /// Watch a dot-delimited path below `root`, such as `"a.b.c"`
    ///
    /// Paths with characters other than word characters, `.` and `$` are
    /// rejected with a warning and the watch observes nothing.
    pub fn path(root: &Value, path: &str) -> Self {
        let getter: Getter = match parse_path(path) {
            Some(segments) => {
                let root = root.clone();
                Rc::new(move || -> Result<Value> { Ok(resolve_path(&root, &segments)) })
            }
            None => {
                warn(
                    &format!(
                        "Failed watching path: \"{}\". Watchers only accept simple dot-delimited paths. For full control, use a function instead.",
                        path
                    ),
                    None,
                );
                Rc::new(|| -> Result<Value> { Ok(Value::Null) })
            }
        };
        Self {
            getter,
            expression: path.to_string(),
            options: WatchOptions::default(),
            owner: None,
        }
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.options.deep = deep;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.options.immediate = immediate;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.options.sync = sync;
        self
    }

    /// Attribute errors to `owner` and route them through its parents
    pub fn owner(mut self, owner: Weak<dyn Lifecycle>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Create the watcher and start watching
    pub fn start(
        self,
        callback: impl Fn(&Value, &Value) -> Result<()> + 'static,
    ) -> Result<WatchHandle> {
        let callback = Rc::new(callback);
        let getter = self.getter;
        let forward = callback.clone();
        let mut builder = Watcher::builder(move || getter())
            .expression(self.expression.clone())
            .user(true)
            .deep(self.options.deep)
            .sync(self.options.sync)
            .callback(move |new, old| forward(new, old));
        if let Some(owner) = &self.owner {
            builder = builder.owner(owner.clone());
        }
        let watcher = builder.build()?;

        if self.options.immediate {
            let value = watcher.value();
            if let Err(err) = callback(&value, &Value::Null) {
                let owner = watcher.owner();
                let info = format!("callback for immediate watcher \"{}\"", self.expression);
                if let Err(err) = handle_error(err, owner.as_deref(), &info) {
                    watcher.teardown();
                    return Err(err);
                }
            }
        }
        Ok(WatchHandle { watcher })
    }
}

/// Watch a function's result
pub fn watch(
    getter: impl Fn() -> Result<Value> + 'static,
    callback: impl Fn(&Value, &Value) -> Result<()> + 'static,
    options: WatchOptions,
) -> Result<WatchHandle> {
    Watch::new(getter).options(options).start(callback)
}

/// Watch a dot-delimited path below `root`
pub fn watch_path(
    root: &Value,
    path: &str,
    callback: impl Fn(&Value, &Value) -> Result<()> + 'static,
    options: WatchOptions,
) -> Result<WatchHandle> {
    Watch::path(root, path).options(options).start(callback)
}

/// Split a watch path into segments, or `None` if it is not a simple path
pub fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$');
    if !valid {
        return None;
    }
    Some(path.split('.').map(str::to_string).collect())
}

/// Follow parsed path segments below `root`, reading each step
///
/// Missing keys and non-container steps resolve to null.
pub fn resolve_path(root: &Value, segments: &[String]) -> Value {
    let mut current = root.clone();
    for segment in segments {
        current = match &current {
            Value::Map(map) => map.get(segment).unwrap_or_default(),
            Value::List(list) => match segment.parse::<usize>() {
                Ok(index) => list.get(index).unwrap_or_default(),
                Err(_) => Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current
}

/// A lazily evaluated, cached value derived from reactive state
///
/// Reading it re-evaluates only when an input changed since the last read.
/// A watcher reading a computed value depends on the computed's inputs.
#[derive(Debug, Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    pub fn new(getter: impl Fn() -> Result<Value> + 'static) -> Self {
        Self::from_builder(Watcher::builder(getter))
    }

    /// Build from a prepared watcher builder (expression, owner); the
    /// watcher is always lazy
    pub fn from_builder(builder: WatcherBuilder) -> Self {
        Self {
            watcher: builder.lazy(true).into_watcher(),
        }
    }

    /// Current value, re-evaluated if stale
    pub fn get(&self) -> Result<Value> {
        if self.watcher.is_dirty() {
            self.watcher.evaluate()?;
        }
        if target::is_tracking() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    /// Last computed value, without re-evaluating
    pub fn cached(&self) -> Value {
        self.watcher.value()
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    pub fn teardown(&self) {
        self.watcher.teardown();
    }
}

/// Create a computed value
pub fn computed(getter: impl Fn() -> Result<Value> + 'static) -> Computed {
    Computed::new(getter)
}
