//! Runtime configuration and reporting hooks
//!
//! [`Config`] holds the serializable knobs (loadable from RON). The error and
//! warning handlers are closures and are installed separately. Both live in
//! thread-local state next to the rest of the reactive runtime.

use crate::lifecycle::Lifecycle;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Default threshold for re-triggers of one watcher within one flush
pub const MAX_UPDATE_COUNT: usize = 100;

/// Receives `(error, owner, info)` for every failure the runtime catches
pub type ErrorHandler = Rc<dyn Fn(&Error, Option<&dyn Lifecycle>, &str)>;

/// Receives `(message, owner)` for every warning
pub type WarnHandler = Rc<dyn Fn(&str, Option<&dyn Lifecycle>)>;

/// Configuration for the reactive runtime
///
/// # Example
///
/// ```
/// use reflux_core::Config;
///
/// let config = Config::default();
/// assert!(config.async_flush());
/// assert_eq!(config.max_update_count(), 100);
///
/// let config = Config::from_ron("(silent: true, max_update_count: 0)").unwrap();
/// assert!(config.silent());
/// // Clamped to at least one re-trigger
/// assert_eq!(config.max_update_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Suppress warnings
    silent: bool,
    /// Defer scheduler flushes to the next tick (`false` flushes inside the
    /// write that queued the first watcher)
    async_flush: bool,
    /// Re-trigger threshold before a watcher is treated as looping
    max_update_count: usize,
    /// Log errors nobody handled instead of returning them to the caller
    log_errors: bool,
}

impl Config {
    /// Parse a configuration from RON
    ///
    /// Missing fields take their default values.
    pub fn from_ron(source: &str) -> Result<Self> {
        let mut config: Config =
            ron::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.max_update_count = config.max_update_count.max(1);
        Ok(config)
    }

    /// Serialize this configuration to RON
    pub fn to_ron(&self) -> Result<String> {
        ron::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    pub fn async_flush(&self) -> bool {
        self.async_flush
    }

    pub fn set_async_flush(&mut self, async_flush: bool) {
        self.async_flush = async_flush;
    }

    pub fn max_update_count(&self) -> usize {
        self.max_update_count
    }

    /// Set the re-trigger threshold
    ///
    /// The value is clamped to at least `1`.
    pub fn set_max_update_count(&mut self, n: usize) {
        self.max_update_count = n.max(1);
    }

    pub fn log_errors(&self) -> bool {
        self.log_errors
    }

    pub fn set_log_errors(&mut self, log_errors: bool) {
        self.log_errors = log_errors;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silent: false,
            async_flush: true,
            max_update_count: MAX_UPDATE_COUNT,
            log_errors: true,
        }
    }
}

#[derive(Default)]
struct Handlers {
    error: Option<ErrorHandler>,
    warn: Option<WarnHandler>,
}

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
    static HANDLERS: RefCell<Handlers> = RefCell::new(Handlers::default());
}

/// Snapshot of the active configuration
pub fn config() -> Config {
    CONFIG.with(|c| c.borrow().clone())
}

/// Replace the active configuration
pub fn set_config(config: Config) {
    CONFIG.with(|c| *c.borrow_mut() = config);
}

/// Mutate the active configuration in place
pub fn update_config<R>(f: impl FnOnce(&mut Config) -> R) -> R {
    CONFIG.with(|c| f(&mut c.borrow_mut()))
}

/// Install (or clear) the global error handler
pub fn set_error_handler(handler: Option<ErrorHandler>) {
    HANDLERS.with(|h| h.borrow_mut().error = handler);
}

/// Install (or clear) the global warning handler
pub fn set_warn_handler(handler: Option<WarnHandler>) {
    HANDLERS.with(|h| h.borrow_mut().warn = handler);
}

pub(crate) fn error_handler() -> Option<ErrorHandler> {
    HANDLERS.with(|h| h.borrow().error.clone())
}

pub(crate) fn reset() {
    set_config(Config::default());
    HANDLERS.with(|h| *h.borrow_mut() = Handlers::default());
}

/// Emit a runtime warning
///
/// Goes to the installed warn handler, or to `tracing` when none is set.
/// Nothing is emitted while the configuration is silent.
pub fn warn(msg: &str, owner: Option<&dyn Lifecycle>) {
    if config().silent() {
        return;
    }
    match HANDLERS.with(|h| h.borrow().warn.clone()) {
        Some(handler) => handler(msg, owner),
        None => {
            let component = owner.map(|o| o.name()).unwrap_or("<root>");
            tracing::warn!(component, "{}", msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.silent());
        assert!(config.async_flush());
        assert!(config.log_errors());
        assert_eq!(config.max_update_count(), MAX_UPDATE_COUNT);
    }

    #[test]
    fn test_set_max_update_count_clamped() {
        let mut config = Config::default();
        config.set_max_update_count(0);
        assert_eq!(config.max_update_count(), 1);
        config.set_max_update_count(5);
        assert_eq!(config.max_update_count(), 5);
    }

    #[test]
    fn test_from_ron_partial() {
        let config = Config::from_ron("(async_flush: false)").expect("parse");
        assert!(!config.async_flush());
        assert_eq!(config.max_update_count(), MAX_UPDATE_COUNT);
    }

    #[test]
    fn test_ron_roundtrip() {
        let mut config = Config::default();
        config.set_silent(true);
        config.set_max_update_count(7);
        let text = config.to_ron().expect("serialize");
        assert_eq!(Config::from_ron(&text).expect("parse"), config);
    }

    #[test]
    fn test_from_ron_invalid() {
        assert!(matches!(Config::from_ron("(silent: 3"), Err(Error::Config(_))));
    }

    #[test]
    fn test_warn_goes_to_handler_unless_silent() {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        set_warn_handler(Some(Rc::new(move |_: &str, _: Option<&dyn Lifecycle>| {
            seen.set(seen.get() + 1)
        })));

        warn("first", None);
        assert_eq!(count.get(), 1);

        update_config(|c| c.set_silent(true));
        warn("second", None);
        assert_eq!(count.get(), 1, "silent config must suppress warnings");

        reset();
    }
}
