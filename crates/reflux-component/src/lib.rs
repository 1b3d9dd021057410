//! Reflux Component - component instances on top of reflux-core
//!
//! This crate turns a declarative [`ComponentOptions`] into a live
//! [`Instance`] whose state, derived values, watches and rendering are all
//! driven by reflux-core watchers.
//!
//! ## Architecture
//!
//! ```text
//! Instance
//!  │
//!  ├── data (observed root Map)
//!  ├── computed ← lazy watchers, created first
//!  ├── watch    ← user watchers, created next
//!  ├── render   ← render watcher, created at mount
//!  │    └── Renderer::patch(old, new)
//!  └── children ← destroyed with the parent
//! ```
//!
//! ## Example
//!
//! ```
//! use reflux_component::{ComponentOptions, Instance, RecordingRenderer, VNode};
//! use reflux_core::{run_pending, Map};
//! use std::rc::Rc;
//!
//! let renderer = RecordingRenderer::new();
//! let options = ComponentOptions::new()
//!     .data(|| Map::new().with("count", 0))
//!     .render(|vm| Ok(VNode::text(vm.get("count")?.to_string())));
//!
//! let vm = Instance::new(options, Rc::new(renderer.clone())).unwrap();
//! vm.mount().unwrap();
//! vm.set("count", 1).unwrap();
//! run_pending().unwrap();
//! assert_eq!(renderer.current(), Some(VNode::text("1")));
//! ```

mod error;
mod instance;
mod options;
mod renderer;
mod vnode;

pub use error::{Error, Result};
pub use instance::Instance;
pub use options::{
    ComponentOptions, ComputedFn, DataFn, ErrorCapturedFn, HookFn, RenderFn, WatchEntry, WatchFn,
};
pub use renderer::{Patch, RecordingRenderer, Renderer};
pub use vnode::VNode;
