//! Renderer seam
//!
//! Instances never touch the live output. After every render they hand the
//! previous and the new tree to a [`Renderer`], which applies the
//! difference however the host needs.

use crate::vnode::VNode;
use std::cell::RefCell;
use std::rc::Rc;

/// Applies rendered trees to the live output
pub trait Renderer {
    /// Apply `new` in place of `old`
    ///
    /// `old` is `None` for the first render, `new` is `None` when the
    /// instance is destroyed.
    fn patch(&self, old: Option<&VNode>, new: Option<&VNode>) -> reflux_core::Result<()>;
}

/// One recorded call to [`Renderer::patch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub old: Option<VNode>,
    pub new: Option<VNode>,
}

/// Renderer that records every patch
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Rc<RefCell<Vec<Patch>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn patches(&self) -> Vec<Patch> {
        self.log.borrow().clone()
    }

    pub fn patch_count(&self) -> usize {
        self.log.borrow().len()
    }

    /// Tree applied by the most recent patch
    pub fn current(&self) -> Option<VNode> {
        self.log.borrow().last().and_then(|p| p.new.clone())
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Renderer for RecordingRenderer {
    fn patch(&self, old: Option<&VNode>, new: Option<&VNode>) -> reflux_core::Result<()> {
        tracing::trace!(first = old.is_none(), remove = new.is_none(), "patch");
        self.log.borrow_mut().push(Patch {
            old: old.cloned(),
            new: new.cloned(),
        });
        Ok(())
    }
}
