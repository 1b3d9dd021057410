//! Reflux Core - dependency tracking and update scheduling
//!
//! This crate provides the reactive engine behind reflux components:
//! - Dynamic value types with tracked containers (`Value`, `Map`, `List`)
//! - Dependency objects and deep observation (`Dep`, `observe`)
//! - Watchers that re-collect their dependencies on every run (`Watcher`)
//! - A batching scheduler with runaway-loop detection (`scheduler`)
//! - Deferred callbacks behind a pluggable tick host (`next_tick`)
//! - Error routing through owners, a global handler and `tracing`
//!
//! ## Example
//!
//! ```
//! use reflux_core::{observe, run_pending, watch, Map, Value, WatchOptions};
//!
//! let data = Map::new().with("count", 1);
//! observe(&Value::Map(data.clone()), false);
//!
//! let reader = data.clone();
//! let handle = watch(
//!     move || Ok(reader.get("count").unwrap_or_default()),
//!     |new, old| {
//!         println!("count: {} -> {}", old, new);
//!         Ok(())
//!     },
//!     WatchOptions::default(),
//! )
//! .unwrap();
//!
//! data.set("count", 2);
//! run_pending().unwrap();
//! assert_eq!(handle.value(), Value::Int(2));
//! ```
//!
//! All state is thread-local. Nothing here is `Send`.

mod api;
mod config;
mod dep;
mod error;
mod handler;
mod identity;
mod lifecycle;
pub mod next_tick;
mod observer;
pub mod runtime;
pub mod scheduler;
pub mod target;
mod value;
mod watcher;

pub use api::{
    computed, delete, parse_path, resolve_path, set, watch, watch_path, Computed, Key, Watch,
    WatchHandle, WatchOptions,
};
pub use config::{
    config, set_config, set_error_handler, set_warn_handler, update_config, warn, Config,
    ErrorHandler, WarnHandler, MAX_UPDATE_COUNT,
};
pub use dep::Dep;
pub use error::{Error, Result};
pub use handler::{handle_error, log_error};
pub use identity::{DepId, WatcherId};
pub use lifecycle::{Hook, Lifecycle};
pub use next_tick::{
    drain, flush_callbacks, next_tick, next_tick_future, next_tick_in, run_pending,
    select_primitive, set_tick_host, LocalPoolHost, ManualHost, TickHost, TickPrimitive,
};
pub use observer::{define_reactive, depend_array, observe, traverse, Observer};
pub use runtime::{reset, should_observe, toggle_observing};
pub use scheduler::{current_flush_timestamp, queue_activated_component, queue_watcher};
pub use target::{untracked, TargetGuard};
pub use value::{List, Map, Opaque, Value};
pub use watcher::{BeforeHook, Callback, Getter, Watcher, WatcherBuilder, WatcherOptions};
