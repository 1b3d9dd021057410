//! Batched watcher execution
//!
//! Watchers notified outside a flush are queued once each and run together
//! on the next tick, in ascending id order. Ids follow creation order, so a
//! parent runs before its children and a computed value is refreshed before
//! the render that reads it.

use crate::config::{config, warn};
use crate::handler::handle_error;
use crate::identity::WatcherId;
use crate::lifecycle::{Hook, Lifecycle};
use crate::next_tick::next_tick_unrouted;
use crate::watcher::Watcher;
use crate::Result;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Watcher>,
    activated: Vec<Rc<dyn Lifecycle>>,
    has: HashSet<WatcherId>,
    circular: HashMap<WatcherId, usize>,
    /// Watchers stopped for the rest of this flush after looping
    halted: HashSet<WatcherId>,
    waiting: bool,
    flushing: bool,
    index: usize,
    flush_timestamp: Option<DateTime<Utc>>,
}

impl SchedulerState {
    fn reset(&mut self) {
        self.queue.clear();
        self.activated.clear();
        self.has.clear();
        self.circular.clear();
        self.halted.clear();
        self.waiting = false;
        self.flushing = false;
        self.index = 0;
    }
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Queue a watcher for the next flush
///
/// A watcher already queued is ignored. During a flush the watcher is
/// inserted after the one currently running, at its id position, so it
/// still runs in this flush.
pub fn queue_watcher(watcher: &Watcher) {
    let id = watcher.id();
    let request_flush = STATE.with(|s| {
        let mut s = s.borrow_mut();
        if !s.has.insert(id) {
            return false;
        }
        if !s.flushing {
            s.queue.push(watcher.clone());
        } else {
            let mut pos = s.queue.len();
            while pos > s.index + 1 && s.queue[pos - 1].id() > id {
                pos -= 1;
            }
            s.queue.insert(pos, watcher.clone());
        }
        if s.waiting {
            false
        } else {
            s.waiting = true;
            true
        }
    });
    if !request_flush {
        return;
    }
    if config().async_flush() {
        next_tick_unrouted(flush_scheduler_queue);
    } else if let Err(err) = flush_scheduler_queue() {
        tracing::error!(error = %err, "synchronous flush failed");
    }
}

/// Queue a kept-alive owner whose `activated` hook should fire after the
/// current flush
pub fn queue_activated_component(owner: Rc<dyn Lifecycle>) {
    STATE.with(|s| s.borrow_mut().activated.push(owner));
}

/// Run every queued watcher
///
/// Watchers queued while this runs are picked up in the same flush. A
/// watcher that queues itself again more than
/// [`Config::max_update_count`](crate::Config::max_update_count) times is
/// reported and skipped for the rest of the flush. State is reset on every
/// exit path.
pub fn flush_scheduler_queue() -> Result<()> {
    let max_update_count = config().max_update_count();
    let size = STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.flush_timestamp = Some(Utc::now());
        s.flushing = true;
        s.index = 0;
        s.queue.sort_by_key(|w| w.id());
        s.queue.len()
    });
    tracing::debug!(queued = size, "flushing scheduler queue");

    loop {
        let next = STATE.with(|s| {
            let s = s.borrow();
            s.queue
                .get(s.index)
                .map(|w| (w.clone(), s.halted.contains(&w.id())))
        });
        let Some((watcher, halted)) = next else {
            break;
        };
        if !halted {
            run_queued(&watcher, max_update_count)?;
        }
        STATE.with(|s| s.borrow_mut().index += 1);
    }

    let (activated, updated) = STATE.with(|s| {
        let mut s = s.borrow_mut();
        let activated = std::mem::take(&mut s.activated);
        let updated = std::mem::take(&mut s.queue);
        s.reset();
        (activated, updated)
    });
    call_activated_hooks(&activated);
    call_updated_hooks(&updated);
    Ok(())
}

fn run_queued(watcher: &Watcher, max_update_count: usize) -> Result<()> {
    let id = watcher.id();
    watcher.call_before();
    STATE.with(|s| s.borrow_mut().has.remove(&id));

    if let Err(err) = watcher.run() {
        let owner = watcher.owner();
        let info = format!("watcher \"{}\"", watcher.expression());
        if let Err(err) = handle_error(err, owner.as_deref(), &info) {
            STATE.with(|s| s.borrow_mut().reset());
            return Err(err);
        }
    }

    let looping = STATE.with(|s| {
        let mut s = s.borrow_mut();
        if !s.has.contains(&id) {
            return false;
        }
        let count = s.circular.entry(id).or_insert(0);
        *count += 1;
        if *count > max_update_count {
            s.halted.insert(id);
            true
        } else {
            false
        }
    });
    if looping {
        let owner = watcher.owner();
        let msg = if watcher.is_user() {
            format!(
                "You may have an infinite update loop in watcher with expression \"{}\"",
                watcher.expression()
            )
        } else {
            "You may have an infinite update loop in a component render function.".to_string()
        };
        warn(&msg, owner.as_deref());
    }
    Ok(())
}

fn call_activated_hooks(owners: &[Rc<dyn Lifecycle>]) {
    for owner in owners {
        owner.activate();
    }
}

fn call_updated_hooks(queue: &[Watcher]) {
    for watcher in queue.iter().rev() {
        if !watcher.is_render() {
            continue;
        }
        if let Some(owner) = watcher.owner() {
            if owner.is_mounted() && !owner.is_destroyed() {
                owner.call_hook(Hook::Updated);
            }
        }
    }
}

/// Whether a flush is running right now
pub fn is_flushing() -> bool {
    STATE.with(|s| s.borrow().flushing)
}

/// Whether a flush has been requested and not yet started or finished
pub fn is_waiting() -> bool {
    STATE.with(|s| s.borrow().waiting)
}

/// Ids currently in the queue, in queue order
pub fn queued_ids() -> Vec<WatcherId> {
    STATE.with(|s| s.borrow().queue.iter().map(|w| w.id()).collect())
}

/// When the most recent flush started
pub fn current_flush_timestamp() -> Option<DateTime<Utc>> {
    STATE.with(|s| s.borrow().flush_timestamp)
}

pub(crate) fn reset() {
    STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.reset();
        s.flush_timestamp = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::next_tick::run_pending;
    use crate::{observe, Map, Value};
    use std::cell::{Cell, RefCell};

    fn tracked(map: Map) -> Map {
        observe(&Value::Map(map.clone()), false);
        map
    }

    #[test]
    fn test_updates_are_batched() {
        crate::reset();
        let data = tracked(Map::new().with("a", 1).with("b", 1));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let d = data.clone();
        let _watcher = Watcher::builder(move || {
            counter.set(counter.get() + 1);
            let a = d.get("a").unwrap_or_default().try_int()?;
            let b = d.get("b").unwrap_or_default().try_int()?;
            Ok(Value::Int(a + b))
        })
        .build()
        .expect("watcher");

        data.set("a", 2);
        data.set("b", 3);
        data.set("a", 4);
        assert_eq!(runs.get(), 1, "nothing runs before the tick");
        assert_eq!(queued_ids().len(), 1);
        assert!(is_waiting());

        run_pending().expect("flush");
        assert_eq!(runs.get(), 2);
        assert!(!is_waiting());
        assert!(current_flush_timestamp().is_some());
    }

    #[test]
    fn test_flush_runs_in_id_order() {
        crate::reset();
        let order = Rc::new(RefCell::new(Vec::new()));
        let watchers: Vec<Watcher> = (0..3)
            .map(|i| {
                let log = order.clone();
                Watcher::builder(move || {
                    log.borrow_mut().push(i);
                    Ok(Value::Int(i))
                })
                .build()
                .expect("watcher")
            })
            .collect();
        order.borrow_mut().clear();

        // Queue in reverse creation order; the flush sorts by id
        for w in watchers.iter().rev() {
            queue_watcher(w);
            queue_watcher(w);
        }
        let expected: Vec<WatcherId> = watchers.iter().rev().map(|w| w.id()).collect();
        assert_eq!(queued_ids(), expected, "duplicates are dropped");

        run_pending().expect("flush");
        assert_eq!(order.borrow().as_slice(), [0, 1, 2]);
    }

    #[test]
    fn test_watcher_queued_during_flush_runs_in_same_flush() {
        crate::reset();
        let data = tracked(Map::new().with("a", 1).with("b", 1));
        let b_runs = Rc::new(Cell::new(0));

        let d = data.clone();
        let counter = b_runs.clone();
        let _reader = Watcher::builder(move || {
            counter.set(counter.get() + 1);
            Ok(d.get("b").unwrap_or_default())
        })
        .build()
        .expect("reader");

        let d = data.clone();
        let d2 = data.clone();
        let _writer = Watcher::builder(move || Ok(d.get("a").unwrap_or_default()))
            .callback(move |new, _| {
                d2.set("b", new.clone());
                Ok(())
            })
            .build()
            .expect("writer");

        data.set("a", 5);
        run_pending().expect("flush");
        assert_eq!(b_runs.get(), 2);
        assert!(!crate::next_tick::has_pending(), "no second flush needed");
        assert_eq!(data.peek("b"), Some(Value::Int(5)));
    }

    #[test]
    fn test_runaway_watcher_is_halted_and_reported_once() {
        crate::reset();
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let log = warnings.clone();
        crate::set_warn_handler(Some(Rc::new(
            move |msg: &str, _: Option<&dyn crate::Lifecycle>| log.borrow_mut().push(msg.to_string()),
        )));

        let data = tracked(Map::new().with("n", 0).with("other", 0));
        let runs = Rc::new(Cell::new(0usize));

        let d = data.clone();
        let d2 = data.clone();
        let counter = runs.clone();
        let _looping = Watcher::builder(move || Ok(d.get("n").unwrap_or_default()))
            .user(true)
            .expression("n")
            .callback(move |new, _| {
                counter.set(counter.get() + 1);
                d2.set("n", new.try_int()? + 1);
                Ok(())
            })
            .build()
            .expect("looping");

        let other_runs = Rc::new(Cell::new(0));
        let d = data.clone();
        let counter = other_runs.clone();
        let _other = Watcher::builder(move || Ok(d.get("other").unwrap_or_default()))
            .callback(move |_, _| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .build()
            .expect("other");

        data.set("n", 1);
        data.set("other", 1);
        run_pending().expect("flush");

        assert_eq!(runs.get(), MAX_RUNS);
        assert_eq!(other_runs.get(), 1, "other watchers keep running");
        let loops: Vec<_> = warnings
            .borrow()
            .iter()
            .filter(|m| m.contains("infinite update loop"))
            .cloned()
            .collect();
        assert_eq!(loops.len(), 1);
        assert!(loops[0].contains("\"n\""));
        assert!(!is_flushing());
        assert!(queued_ids().is_empty());
        crate::reset();
    }

    /// Initial run plus one run per allowed re-trigger
    const MAX_RUNS: usize = crate::config::MAX_UPDATE_COUNT + 1;

    #[test]
    fn test_sync_flush_mode() {
        crate::reset();
        crate::update_config(|c| c.set_async_flush(false));
        let data = tracked(Map::new().with("a", 1));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let d = data.clone();
        let _w = Watcher::builder(move || {
            counter.set(counter.get() + 1);
            Ok(d.get("a").unwrap_or_default())
        })
        .build()
        .expect("watcher");

        data.set("a", 2);
        assert_eq!(runs.get(), 2);
        assert!(!crate::next_tick::has_pending());
        crate::reset();
    }

    #[test]
    fn test_sync_flush_error_reaches_error_handler_once() {
        crate::reset();
        crate::update_config(|c| c.set_async_flush(false));
        let infos = Rc::new(RefCell::new(Vec::new()));
        let log = infos.clone();
        crate::set_error_handler(Some(Rc::new(
            move |_: &crate::Error, _: Option<&dyn Lifecycle>, info: &str| {
                log.borrow_mut().push(info.to_string())
            },
        )));
        let data = tracked(Map::new().with("a", 1));
        let d = data.clone();
        let _w = Watcher::builder(move || {
            if d.get("a").unwrap_or_default().try_int()? > 1 {
                return Err(crate::Error::evaluation("bad render"));
            }
            Ok(Value::Null)
        })
        .expression("a")
        .build()
        .expect("watcher");

        data.set("a", 2);
        assert_eq!(infos.borrow().as_slice(), ["watcher \"a\""]);
        assert!(!is_flushing());
        crate::reset();
    }

    #[test]
    fn test_torn_down_watcher_in_queue_is_noop() {
        crate::reset();
        let data = tracked(Map::new().with("a", 1));
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let d = data.clone();
        let watcher = Watcher::builder(move || {
            counter.set(counter.get() + 1);
            Ok(d.get("a").unwrap_or_default())
        })
        .build()
        .expect("watcher");

        data.set("a", 2);
        assert_eq!(queued_ids(), vec![watcher.id()]);
        watcher.teardown();
        run_pending().expect("flush");
        assert_eq!(runs.get(), 1, "only the initial evaluation ran");
        assert!(queued_ids().is_empty());
        assert_eq!(crate::target::depth(), 0);
    }

    #[test]
    fn test_non_user_error_aborts_when_unhandled() {
        crate::reset();
        crate::update_config(|c| {
            c.set_log_errors(false);
            c.set_silent(true);
        });
        let data = tracked(Map::new().with("a", 1));
        let d = data.clone();
        let _w = Watcher::builder(move || {
            let a = d.get("a").unwrap_or_default().try_int()?;
            if a > 1 {
                return Err(crate::Error::evaluation("bad render"));
            }
            Ok(Value::Int(a))
        })
        .build()
        .expect("watcher");

        data.set("a", 2);
        assert!(run_pending().is_err());
        assert!(!is_flushing());
        assert!(!is_waiting());
        assert!(queued_ids().is_empty());
        crate::reset();
    }
}
