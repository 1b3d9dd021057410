//! Error routing
//!
//! Failures caught by the runtime travel up the owner's parent chain first,
//! then to the global error handler, then to the log. Only when none of
//! those takes the error is it handed back to the caller.

use crate::config::{self, warn};
use crate::lifecycle::Lifecycle;
use crate::target::TargetGuard;
use crate::{Error, Result};

/// Route an error raised on behalf of `owner`
///
/// `info` names where it happened (for example `getter for watcher "a.b"`
/// or `nextTick`). Returns `Err` only when nothing handled the error and
/// error logging is disabled.
pub fn handle_error(err: Error, owner: Option<&dyn Lifecycle>, info: &str) -> Result<()> {
    // Handlers must not subscribe the watcher being evaluated
    let _guard = TargetGuard::suspend();
    if let Some(origin) = owner {
        let mut current = origin.parent();
        while let Some(parent) = current {
            if parent.capture_error(&err, origin, info) {
                tracing::debug!(info, component = parent.name(), "error captured");
                return Ok(());
            }
            current = parent.parent();
        }
    }
    global_handle_error(err, owner, info)
}

fn global_handle_error(err: Error, owner: Option<&dyn Lifecycle>, info: &str) -> Result<()> {
    if let Some(handler) = config::error_handler() {
        handler(&err, owner, info);
        return Ok(());
    }
    log_error(err, owner, info)
}

/// Last stop for an unhandled error
pub fn log_error(err: Error, owner: Option<&dyn Lifecycle>, info: &str) -> Result<()> {
    warn(&format!("Error in {}: \"{}\"", info, err), owner);
    if config::config().log_errors() {
        tracing::error!(info, error = %err, "unhandled error");
        Ok(())
    } else {
        Err(err)
    }
}
