//! Deferred callbacks
//!
//! Callbacks registered with [`next_tick`] are collected into one batch and
//! run together, in registration order, when the host runs the tick. The
//! scheduler uses the same batch for its flush, so a callback registered
//! after a write observes the updated state.
//!
//! How the tick is driven is up to the installed [`TickHost`]. The default
//! [`ManualHost`] does nothing on its own: the embedding code calls
//! [`run_pending`] (or [`drain`]) when it yields.

use crate::handler::handle_error;
use crate::lifecycle::Lifecycle;
use crate::Result;
use futures::channel::oneshot;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::{Rc, Weak};

/// A deferred callback
pub type TickCallback = Box<dyn FnOnce() -> Result<()>>;

/// Deferral primitives a host may offer, most eager first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TickPrimitive {
    /// Runs when the current task completes
    Promise,
    /// Runs after the current task, through a change notification
    MutationObserver,
    /// Runs on the next turn of the event loop
    Immediate,
    /// Runs after a timer fires
    Timeout,
}

/// Pick the most eager primitive available, falling back to a timer
pub fn select_primitive(available: &[TickPrimitive]) -> TickPrimitive {
    available
        .iter()
        .copied()
        .min()
        .unwrap_or(TickPrimitive::Timeout)
}

/// Drives the tick
pub trait TickHost {
    /// Primitives this host can schedule with
    fn primitives(&self) -> Vec<TickPrimitive>;

    /// Arrange for [`flush_callbacks`] to be called once, later
    fn schedule(&self, primitive: TickPrimitive);
}

/// Host that only records requests; the embedder pumps the queue
#[derive(Debug, Default)]
pub struct ManualHost {
    requests: Cell<usize>,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many ticks have been requested so far
    pub fn requests(&self) -> usize {
        self.requests.get()
    }
}

impl TickHost for ManualHost {
    fn primitives(&self) -> Vec<TickPrimitive> {
        vec![TickPrimitive::Promise]
    }

    fn schedule(&self, primitive: TickPrimitive) {
        self.requests.set(self.requests.get() + 1);
        tracing::trace!(?primitive, "tick requested");
    }
}

/// Host that runs ticks as tasks on a `futures` local executor
///
/// The tick runs the next time the owning `LocalPool` is polled.
pub struct LocalPoolHost {
    spawner: LocalSpawner,
}

impl LocalPoolHost {
    pub fn new(spawner: LocalSpawner) -> Self {
        Self { spawner }
    }
}

impl TickHost for LocalPoolHost {
    fn primitives(&self) -> Vec<TickPrimitive> {
        vec![TickPrimitive::Promise, TickPrimitive::Timeout]
    }

    fn schedule(&self, primitive: TickPrimitive) {
        let task = async move {
            if let Err(err) = flush_callbacks() {
                tracing::error!(?primitive, error = %err, "tick failed");
            }
        };
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::error!(error = %err, "could not schedule tick");
        }
    }
}

struct Pending {
    callback: TickCallback,
    owner: Option<Weak<dyn Lifecycle>>,
    /// Scheduler flushes route their own errors
    route_errors: bool,
}

struct TickState {
    callbacks: Vec<Pending>,
    pending: bool,
    host: Rc<dyn TickHost>,
}

impl TickState {
    fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            pending: false,
            host: Rc::new(ManualHost::new()),
        }
    }
}

thread_local! {
    static TICK: RefCell<TickState> = RefCell::new(TickState::new());
}

/// Install a tick host, returning the previous one
pub fn set_tick_host(host: Rc<dyn TickHost>) -> Rc<dyn TickHost> {
    TICK.with(|t| std::mem::replace(&mut t.borrow_mut().host, host))
}

/// Defer `callback` to the next tick
pub fn next_tick(callback: impl FnOnce() -> Result<()> + 'static) {
    enqueue(Pending {
        callback: Box::new(callback),
        owner: None,
        route_errors: true,
    });
}

/// Defer `callback` on behalf of `owner`; its errors are routed through
/// the owner's parent chain
pub fn next_tick_in(owner: Weak<dyn Lifecycle>, callback: impl FnOnce() -> Result<()> + 'static) {
    enqueue(Pending {
        callback: Box::new(callback),
        owner: Some(owner),
        route_errors: true,
    });
}

pub(crate) fn next_tick_unrouted(callback: impl FnOnce() -> Result<()> + 'static) {
    enqueue(Pending {
        callback: Box::new(callback),
        owner: None,
        route_errors: false,
    });
}

/// A future that completes once the next tick has run
pub fn next_tick_future() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel::<()>();
    next_tick(move || {
        // The receiver may have been dropped
        let _ = tx.send(());
        Ok(())
    });
    async move {
        let _ = rx.await;
    }
}

fn enqueue(pending: Pending) {
    let host = TICK.with(|t| {
        let mut t = t.borrow_mut();
        t.callbacks.push(pending);
        if t.pending {
            None
        } else {
            t.pending = true;
            Some(t.host.clone())
        }
    });
    if let Some(host) = host {
        let primitive = select_primitive(&host.primitives());
        host.schedule(primitive);
    }
}

/// Run the current batch
///
/// Callbacks registered while the batch runs go into the next batch. A
/// failing callback does not stop the others; the first error nothing
/// handled is returned after the batch completes.
pub fn flush_callbacks() -> Result<()> {
    let batch = TICK.with(|t| {
        let mut t = t.borrow_mut();
        t.pending = false;
        std::mem::take(&mut t.callbacks)
    });
    let _span = tracing::debug_span!("next_tick", callbacks = batch.len()).entered();

    let mut unhandled = None;
    for pending in batch {
        let Err(err) = (pending.callback)() else {
            continue;
        };
        let result = if pending.route_errors {
            let owner = pending.owner.as_ref().and_then(Weak::upgrade);
            handle_error(err, owner.as_deref(), "nextTick")
        } else {
            Err(err)
        };
        if let Err(err) = result {
            if unhandled.is_none() {
                unhandled = Some(err);
            } else {
                tracing::error!(error = %err, "further unhandled error in tick");
            }
        }
    }
    unhandled.map_or(Ok(()), Err)
}

/// Whether a tick has been requested and not yet run
pub fn has_pending() -> bool {
    TICK.with(|t| t.borrow().pending)
}

/// Run the pending tick, if any. Returns whether one ran.
pub fn run_pending() -> Result<bool> {
    if !has_pending() {
        return Ok(false);
    }
    flush_callbacks()?;
    Ok(true)
}

/// Run ticks until no more are requested
pub fn drain() -> Result<usize> {
    let mut ticks = 0;
    while run_pending()? {
        ticks += 1;
    }
    Ok(ticks)
}

pub(crate) fn reset() {
    TICK.with(|t| *t.borrow_mut() = TickState::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use futures::executor::{block_on, LocalPool};

    #[test]
    fn test_primitive_preference() {
        use TickPrimitive::*;
        assert_eq!(select_primitive(&[Timeout, Immediate, Promise]), Promise);
        assert_eq!(select_primitive(&[Timeout, MutationObserver]), MutationObserver);
        assert_eq!(select_primitive(&[]), Timeout);
    }

    #[test]
    fn test_callbacks_run_fifo_in_one_batch() {
        crate::reset();
        let host = Rc::new(ManualHost::new());
        set_tick_host(host.clone());

        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            next_tick(move || {
                order.borrow_mut().push(i);
                Ok(())
            });
        }
        assert_eq!(host.requests(), 1, "one tick per batch");
        assert!(order.borrow().is_empty());

        assert!(run_pending().expect("tick"));
        assert_eq!(order.borrow().as_slice(), [0, 1, 2]);
        assert!(!run_pending().expect("tick"));
    }

    #[test]
    fn test_failing_callback_does_not_stop_batch() {
        crate::reset();
        crate::update_config(|c| c.set_silent(true));
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        next_tick(|| Err(Error::evaluation("first fails")));
        next_tick(move || {
            flag.set(true);
            Ok(())
        });
        // Logged, so the tick itself succeeds
        run_pending().expect("tick");
        assert!(ran.get());
        crate::reset();
    }

    #[test]
    fn test_callback_scheduled_during_tick_runs_next_tick() {
        crate::reset();
        let ran = Rc::new(Cell::new(0));
        let outer = ran.clone();
        next_tick(move || {
            let inner = outer.clone();
            next_tick(move || {
                inner.set(inner.get() + 1);
                Ok(())
            });
            Ok(())
        });
        run_pending().expect("tick");
        assert_eq!(ran.get(), 0);
        assert_eq!(drain().expect("drain"), 1);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn test_future_resolves_after_tick() {
        crate::reset();
        let mut pool = LocalPool::new();
        set_tick_host(Rc::new(LocalPoolHost::new(pool.spawner())));

        let flag = Rc::new(Cell::new(false));
        let setter = flag.clone();
        next_tick(move || {
            setter.set(true);
            Ok(())
        });
        let seen = flag.clone();
        let observed = pool.run_until(async move {
            next_tick_future().await;
            seen.get()
        });
        assert!(observed);
        crate::reset();
    }

    #[test]
    fn test_future_with_manual_host() {
        crate::reset();
        let fut = next_tick_future();
        run_pending().expect("tick");
        block_on(fut);
    }
}
