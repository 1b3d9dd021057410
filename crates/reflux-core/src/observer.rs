//! Deep wrapping of containers
//!
//! [`observe`] attaches an [`Observer`] marker to a [`Map`] or [`List`] and
//! walks its contents so that every nested container is tracked too. Map
//! fields get their own [`Dep`]; lists are tracked as a whole.

use crate::dep::Dep;
use crate::runtime::should_observe;
use crate::target;
use crate::value::{List, Map, Value};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

/// Marker carried by a tracked container
#[derive(Debug)]
pub struct Observer {
    dep: Dep,
    root_count: Cell<usize>,
}

impl Observer {
    fn new() -> Self {
        Self {
            dep: Dep::new(),
            root_count: Cell::new(0),
        }
    }

    /// Dependency for structural changes (added keys, list mutations)
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many component instances use this container as root data
    pub fn root_count(&self) -> usize {
        self.root_count.get()
    }

    /// Called when a component using this container as root data is destroyed
    pub fn release_root(&self) {
        self.root_count.set(self.root_count.get().saturating_sub(1));
    }
}

/// Make a value tracked
///
/// Returns the marker for containers, `None` for primitives and opaque
/// values and for containers that are frozen, raw, or seen while
/// observation is toggled off. Observing a tracked container again returns
/// its existing marker. `as_root` counts the container as component root
/// data.
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
    let ob = match value {
        Value::Map(map) => observe_map(map)?,
        Value::List(list) => observe_list(list)?,
        _ => return None,
    };
    if as_root {
        ob.root_count.set(ob.root_count.get() + 1);
    }
    Some(ob)
}

fn observe_map(map: &Map) -> Option<Rc<Observer>> {
    if let Some(ob) = map.observer() {
        return Some(ob);
    }
    if !should_observe() || map.is_frozen() || map.is_raw() {
        return None;
    }
    let ob = Rc::new(Observer::new());
    // Marker first so cycles back to this map stop here
    map.0.borrow_mut().observer = Some(ob.clone());
    for key in map.peek_keys() {
        define_reactive(map, &key);
    }
    Some(ob)
}

fn observe_list(list: &List) -> Option<Rc<Observer>> {
    if let Some(ob) = list.observer() {
        return Some(ob);
    }
    if !should_observe() || list.is_frozen() || list.is_raw() {
        return None;
    }
    let ob = Rc::new(Observer::new());
    list.0.borrow_mut().observer = Some(ob.clone());
    for item in list.peek_items() {
        observe(&item, false);
    }
    Some(ob)
}

/// Install a dependency on an existing field and observe its value
///
/// Fields created with [`Map::define_fixed`] are left alone.
pub fn define_reactive(map: &Map, key: &str) {
    let value = {
        let mut inner = map.0.borrow_mut();
        let Some(field) = inner.fields.get_mut(key) else {
            return;
        };
        if !field.configurable {
            return;
        }
        if field.dep.is_none() {
            field.dep = Some(Dep::new());
        }
        field.value.clone()
    };
    observe(&value, false);
}

/// Read-path bookkeeping for a reactive field
pub(crate) fn track_read(dep: &Dep, value: &Value) {
    if !target::is_tracking() {
        return;
    }
    dep.depend();
    if let Some(child) = value.observer() {
        child.dep().depend();
        if let Value::List(list) = value {
            depend_array(list);
        }
    }
}

/// Depend on every tracked element of a list, recursively
///
/// Element reads cannot be intercepted, so a reader of the list also reads
/// through to the containers inside it. Primitive elements are skipped.
pub fn depend_array(list: &List) {
    for item in list.peek_items() {
        if let Some(ob) = item.observer() {
            ob.dep().depend();
            if let Value::List(inner) = &item {
                depend_array(inner);
            }
        }
    }
}

/// Read every nested field and element of `value`
///
/// Used by deep watchers so the current target depends on the whole tree.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Map(map) => {
            if map.is_frozen() || !seen.insert(Rc::as_ptr(&map.0) as *const () as usize) {
                return;
            }
            for key in map.peek_keys() {
                if let Some(child) = map.get(&key) {
                    traverse_inner(&child, seen);
                }
            }
        }
        Value::List(list) => {
            if list.is_frozen() || !seen.insert(Rc::as_ptr(&list.0) as *const () as usize) {
                return;
            }
            for item in list.items() {
                traverse_inner(&item, seen);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::toggle_observing;
    use crate::{Value, Watcher};
    use std::cell::Cell;

    fn record(getter: impl Fn() -> crate::Result<Value> + 'static) -> (Watcher, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let watcher = Watcher::builder(move || {
            counter.set(counter.get() + 1);
            getter()
        })
        .sync(true)
        .build()
        .expect("watcher");
        (watcher, runs)
    }

    #[test]
    fn test_observe_is_idempotent() {
        let data = Value::Map(Map::new().with("a", 1));
        let first = observe(&data, false).expect("observed");
        let second = observe(&data, true).expect("observed");
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.root_count(), 1);
    }

    #[test]
    fn test_ineligible_values() {
        assert!(observe(&Value::Int(1), false).is_none());

        let frozen = Map::new().with("a", 1);
        frozen.freeze();
        assert!(observe(&Value::Map(frozen), false).is_none());

        let raw = List::new();
        raw.mark_raw();
        assert!(observe(&Value::List(raw), false).is_none());

        toggle_observing(false);
        assert!(observe(&Value::Map(Map::new()), false).is_none());
        toggle_observing(true);
    }

    #[test]
    fn test_nested_values_are_observed() {
        let inner = Map::new().with("b", 1);
        let list = List::from(vec![Value::Map(Map::new())]);
        let outer = Map::new().with("inner", inner.clone()).with("list", list.clone());
        observe(&Value::Map(outer.clone()), false);

        assert!(outer.field_dep("inner").is_some());
        assert!(inner.field_dep("b").is_some());
        assert!(list.observer().is_some());
        assert!(list.peek_items()[0].observer().is_some());
    }

    #[test]
    fn test_fixed_field_is_skipped() {
        let map = Map::new().with("a", 1);
        map.define_fixed("locked", 2);
        observe(&Value::Map(map.clone()), false);
        assert!(map.field_dep("a").is_some());
        assert!(map.field_dep("locked").is_none());
    }

    #[test]
    fn test_self_referencing_map() {
        let map = Map::new();
        map.insert_plain("me".into(), Value::Map(map.clone()));
        let ob = observe(&Value::Map(map.clone()), false);
        assert!(ob.is_some());

        let (_w, runs) = record({
            let map = map.clone();
            move || {
                let value = Value::Map(map.clone());
                traverse(&value);
                Ok(value)
            }
        });
        assert_eq!(runs.get(), 1);
        // Break the cycle so the test does not leak
        map.remove_field("me");
    }

    #[test]
    fn test_list_read_depends_through_elements() {
        let element = Map::new().with("n", 1);
        let list = List::from(vec![Value::Map(element.clone()), Value::Int(3)]);
        let data = Map::new().with("items", list.clone());
        observe(&Value::Map(data.clone()), false);

        let (_w, runs) = record({
            let data = data.clone();
            move || Ok(data.get("items").unwrap_or_default())
        });
        assert_eq!(runs.get(), 1);

        // A structural change inside an element reaches a reader of the list
        crate::set(&Value::Map(element.clone()), "m", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_traverse_reads_everything() {
        let leaf = Map::new().with("x", 1);
        let data = Map::new().with("leaf", leaf.clone());
        observe(&Value::Map(data.clone()), false);

        let (_w, runs) = record({
            let data = data.clone();
            move || {
                let value = Value::Map(data.clone());
                traverse(&value);
                Ok(Value::Null)
            }
        });
        leaf.set("x", 2);
        assert_eq!(runs.get(), 2, "deep read must reach nested fields");
    }
}
