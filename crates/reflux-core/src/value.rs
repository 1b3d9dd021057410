//! Dynamic values and the tracked containers behind them
//!
//! [`Map`] and [`List`] are shared handles: cloning one clones the handle,
//! not the contents, and two values are "the same" only when they are the
//! same handle. Reads through the public accessors register the current
//! watcher as a dependency. Writes notify. Nothing is tracked until the
//! container has been passed through [`observe`](crate::observe).

use crate::config::warn;
use crate::dep::Dep;
use crate::observer::{self, Observer};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::any::Any;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// A dynamic value held in reactive state
#[derive(Clone, Default)]
pub enum Value {
    /// No value / null
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Shared ordered sequence
    List(List),
    /// Shared record of named fields
    Map(Map),
    /// Host object (for example a rendered node); never observed
    Opaque(Opaque),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as a float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Integer or a type error, for use with `?` inside getters
    pub fn try_int(&self) -> Result<i64> {
        self.as_int().ok_or_else(|| self.type_error("int"))
    }

    /// Number or a type error, for use with `?` inside getters
    pub fn try_float(&self) -> Result<f64> {
        self.as_float().ok_or_else(|| self.type_error("float"))
    }

    pub fn try_bool(&self) -> Result<bool> {
        self.as_bool().ok_or_else(|| self.type_error("bool"))
    }

    pub fn try_str(&self) -> Result<&str> {
        self.as_str().ok_or_else(|| self.type_error("string"))
    }

    fn type_error(&self, expected: &str) -> Error {
        Error::TypeError {
            expected: expected.to_string(),
            got: self.type_name().to_string(),
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Opaque(_) => "opaque",
        }
    }

    /// Check if this value is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) | Value::Opaque(_) => true,
        }
    }

    /// Whether this value is an object (container or host object)
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Opaque(_))
    }

    /// Identity comparison used by the write path
    ///
    /// Containers compare by handle, primitives by value. Two NaNs are the
    /// same, and integers compare numerically with floats.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// The observer marker of a tracked container
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Value::List(list) => list.observer(),
            Value::Map(map) => map.observer(),
            _ => None,
        }
    }

    /// Default ordering used by [`List::sort`]
    ///
    /// Values of different kinds order null, bool, number, string, list,
    /// map, opaque.
    pub fn compare(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Int(_) | Value::Float(_) => 2,
                Value::String(_) => 3,
                Value::List(_) => 4,
                Value::Map(_) => 5,
                Value::Opaque(_) => 6,
            }
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => match (self.as_float(), other.as_float()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => rank(self).cmp(&rank(other)),
            },
        }
    }
}

impl PartialEq for Value {
    /// Structural equality over current contents (untracked)
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => a.ptr_eq(b) || a.peek_items() == b.peek_items(),
            (Value::Map(a), Value::Map(b)) => {
                a.ptr_eq(b) || {
                    let left = a.peek_entries();
                    let right = b.peek_entries();
                    left.len() == right.len()
                        && left.iter().zip(right.iter()).all(|(l, r)| l == r)
                }
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.same(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(fl) => write!(f, "Float({})", fl),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::List(list) => write!(f, "List({:?})", list),
            Value::Map(map) => write!(f, "Map({:?})", map),
            Value::Opaque(o) => write!(f, "{:?}", o),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, v) in list.peek_items().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.peek_entries().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

/// Host object carried through reactive state without being observed
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque(..)")
    }
}

/// A single named slot of a [`Map`]
pub(crate) struct Field {
    pub(crate) value: Value,
    /// Installed by the value wrapper; `None` for plain fields
    pub(crate) dep: Option<Dep>,
    pub(crate) configurable: bool,
}

impl Field {
    pub(crate) fn plain(value: Value) -> Self {
        Self {
            value,
            dep: None,
            configurable: true,
        }
    }
}

#[derive(Default)]
pub(crate) struct MapInner {
    pub(crate) fields: IndexMap<String, Field>,
    pub(crate) observer: Option<Rc<Observer>>,
    pub(crate) frozen: bool,
    pub(crate) raw: bool,
}

/// Shared record of named fields
///
/// Field order is insertion order.
#[derive(Clone, Default)]
pub struct Map(pub(crate) Rc<RefCell<MapInner>>);

impl Map {
    /// Create a new empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style write
    ///
    /// A new key is added as a plain field. An existing key is written with
    /// [`set`](Self::set), so a reactive field keeps its dependency and its
    /// readers are notified.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Read a field, registering the current watcher
    ///
    /// Reading a missing key depends on the map's own structure, so adding
    /// the key later with [`set`](crate::set) reaches this reader.
    pub fn get(&self, key: &str) -> Option<Value> {
        let found = {
            let inner = self.0.borrow();
            inner
                .fields
                .get(key)
                .map(|field| (field.value.clone(), field.dep.clone()))
        };
        match found {
            Some((value, dep)) => {
                if let Some(dep) = dep {
                    observer::track_read(&dep, &value);
                }
                Some(value)
            }
            None => {
                self.track_structure();
                None
            }
        }
    }

    /// Read a field or fail with [`Error::KeyNotFound`]
    pub fn require(&self, key: &str) -> Result<Value> {
        self.get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Read a field without registering any dependency
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.0.borrow().fields.get(key).map(|f| f.value.clone())
    }

    /// Write a field
    ///
    /// Writing the same value is a no-op. Writing a reactive field stores
    /// the value, observes it if it is a container, and notifies readers.
    /// Writing a key that does not exist adds a plain, untracked field.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self.is_frozen() {
            warn(&format!("Cannot assign to \"{}\" of a frozen map", key), None);
            return;
        }
        let dep = {
            let mut inner = self.0.borrow_mut();
            match inner.fields.get_mut(&key) {
                Some(field) => {
                    if field.value.same(&value) {
                        return;
                    }
                    field.value = value.clone();
                    field.dep.clone()
                }
                None => {
                    inner.fields.insert(key, Field::plain(value));
                    return;
                }
            }
        };
        if let Some(dep) = dep {
            observer::observe(&value, false);
            dep.notify();
        }
    }

    /// Insert a field that can never be made reactive
    pub fn define_fixed(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().fields.insert(
            key.into(),
            Field {
                value: value.into(),
                dep: None,
                configurable: false,
            },
        );
    }

    /// Whether the key exists (tracks the map's structure)
    pub fn contains_key(&self, key: &str) -> bool {
        self.track_structure();
        self.0.borrow().fields.contains_key(key)
    }

    /// Keys in insertion order (tracks the map's structure)
    pub fn keys(&self) -> Vec<String> {
        self.track_structure();
        self.peek_keys()
    }

    /// Entries in insertion order, reading every field
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.keys()
            .into_iter()
            .filter_map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.track_structure();
        self.0.borrow().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze this map: it is never observed and rejects writes
    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Exempt this map from observation while keeping it writable
    pub fn mark_raw(&self) {
        self.0.borrow_mut().raw = true;
    }

    pub fn is_raw(&self) -> bool {
        self.0.borrow().raw
    }

    /// The observer marker, if this map is tracked
    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    /// The dependency object installed on a field, if any
    pub fn field_dep(&self, key: &str) -> Option<Dep> {
        self.0.borrow().fields.get(key).and_then(|f| f.dep.clone())
    }

    /// Whether both handles point at the same map
    pub fn ptr_eq(&self, other: &Map) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn peek_keys(&self) -> Vec<String> {
        self.0.borrow().fields.keys().cloned().collect()
    }

    pub(crate) fn peek_entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .fields
            .iter()
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect()
    }

    /// Store a value without notifying; an existing field keeps its dep
    pub(crate) fn insert_plain(&self, key: String, value: Value) {
        let mut inner = self.0.borrow_mut();
        match inner.fields.get_mut(&key) {
            Some(field) => field.value = value,
            None => {
                inner.fields.insert(key, Field::plain(value));
            }
        }
    }

    /// Remove a configurable field; fixed fields stay in place
    pub(crate) fn remove_field(&self, key: &str) -> Option<Value> {
        let mut inner = self.0.borrow_mut();
        if !inner.fields.get(key)?.configurable {
            return None;
        }
        inner.fields.shift_remove(key).map(|f| f.value)
    }

    fn track_structure(&self) {
        if let Some(ob) = self.observer() {
            ob.dep().depend();
        }
    }
}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.peek_entries()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Map::new();
        for (k, v) in iter {
            map.insert_plain(k.into(), v.into());
        }
        map
    }
}

#[derive(Default)]
pub(crate) struct ListInner {
    pub(crate) items: Vec<Value>,
    pub(crate) observer: Option<Rc<Observer>>,
    pub(crate) frozen: bool,
    pub(crate) raw: bool,
}

/// Shared ordered sequence
///
/// Elements are not individually reactive. Reads depend on the list
/// itself, and every mutation operation notifies it.
#[derive(Clone, Default)]
pub struct List(pub(crate) Rc<RefCell<ListInner>>);

impl List {
    /// Create a new empty list
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.track();
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element
    pub fn get(&self, index: usize) -> Option<Value> {
        self.track();
        self.0.borrow().items.get(index).cloned()
    }

    /// Read an element or fail with [`Error::IndexOutOfBounds`]
    pub fn require(&self, index: usize) -> Result<Value> {
        self.track();
        let inner = self.0.borrow();
        inner.items.get(index).cloned().ok_or(Error::IndexOutOfBounds {
            index,
            len: inner.items.len(),
        })
    }

    /// Snapshot of all elements
    pub fn items(&self) -> Vec<Value> {
        self.track();
        self.peek_items()
    }

    /// Snapshot of all elements without registering any dependency
    pub fn peek_items(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    pub(crate) fn peek_len(&self) -> usize {
        self.0.borrow().items.len()
    }

    /// Append to the end
    pub fn push(&self, value: impl Into<Value>) {
        let value = value.into();
        self.mutate("push", |items| {
            items.push(value.clone());
            ((), vec![value])
        });
    }

    /// Remove from the end
    pub fn pop(&self) -> Option<Value> {
        self.mutate("pop", |items| (items.pop(), Vec::new()))
            .flatten()
    }

    /// Insert at the front
    pub fn unshift(&self, value: impl Into<Value>) {
        let value = value.into();
        self.mutate("unshift", |items| {
            items.insert(0, value.clone());
            ((), vec![value])
        });
    }

    /// Remove from the front
    pub fn shift(&self) -> Option<Value> {
        self.mutate("shift", |items| {
            let removed = if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            };
            (removed, Vec::new())
        })
        .flatten()
    }

    /// Remove `delete_count` elements at `start` and insert `insert` there
    ///
    /// `start` and the removed range are clamped to the current length.
    /// Returns the removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate("splice", |items| {
            let start = start.min(items.len());
            let end = start.saturating_add(delete_count).min(items.len());
            let removed: Vec<Value> = items.splice(start..end, insert.iter().cloned()).collect();
            (removed, insert)
        })
        .unwrap_or_default()
    }

    /// Sort ascending with [`Value::compare`]
    pub fn sort(&self) {
        self.sort_by(Value::compare);
    }

    /// Sort with a comparator
    ///
    /// The comparator runs while the list is borrowed and must not read
    /// this list.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.mutate("sort", |items| {
            items.sort_by(|a, b| compare(a, b));
            ((), Vec::new())
        });
    }

    /// Reverse in place
    pub fn reverse(&self) {
        self.mutate("reverse", |items| {
            items.reverse();
            ((), Vec::new())
        });
    }

    pub fn freeze(&self) {
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    pub fn mark_raw(&self) {
        self.0.borrow_mut().raw = true;
    }

    pub fn is_raw(&self) -> bool {
        self.0.borrow().raw
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.borrow().observer.clone()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Replace the element at `index`, padding with nulls past the end
    pub(crate) fn set_index(&self, index: usize, value: Value) {
        if index >= self.peek_len() && !self.is_frozen() {
            self.0
                .borrow_mut()
                .items
                .resize(index + 1, Value::Null);
        }
        self.splice(index, 1, vec![value]);
    }

    /// Run a mutation, observe inserted elements, then notify
    fn mutate<R>(
        &self,
        op: &str,
        f: impl FnOnce(&mut Vec<Value>) -> (R, Vec<Value>),
    ) -> Option<R> {
        if self.is_frozen() {
            warn(&format!("Cannot {} on a frozen list", op), None);
            return None;
        }
        let (result, inserted, ob) = {
            let mut inner = self.0.borrow_mut();
            let (result, inserted) = f(&mut inner.items);
            (result, inserted, inner.observer.clone())
        };
        if let Some(ob) = ob {
            for value in &inserted {
                observer::observe(value, false);
            }
            ob.dep().notify();
        }
        Some(result)
    }

    fn track(&self) {
        if let Some(ob) = self.observer() {
            ob.dep().depend();
        }
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.peek_items()).finish()
    }
}

impl From<Vec<Value>> for List {
    fn from(items: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(ListInner {
            items,
            ..ListInner::default()
        })))
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        List::from(iter.into_iter().collect::<Vec<_>>())
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(vec: Vec<T>) -> Self {
        Value::List(vec.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null | Value::Opaque(_) => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let items = list.peek_items();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let entries = map.peek_entries();
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in &entries {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a dynamic value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Value, D::Error> {
        Value::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> std::result::Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> std::result::Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> std::result::Result<Value, E> {
        Ok(i64::try_from(u)
            .map(Value::Int)
            .unwrap_or(Value::Float(u as f64)))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> std::result::Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> std::result::Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> std::result::Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::List(List::from(items)))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Value, A::Error> {
        let map = Map::new();
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            map.insert_plain(k, v);
        }
        Ok(Value::Map(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
