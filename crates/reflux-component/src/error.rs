//! Error types for reflux-component

use thiserror::Error;

/// Result type for component operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reflux-component
#[derive(Debug, Error)]
pub enum Error {
    /// Operation on an instance that has been destroyed
    #[error("component {0} is destroyed")]
    Destroyed(String),

    /// `mount` called twice
    #[error("component {0} is already mounted")]
    AlreadyMounted(String),

    /// `mount` called without a render function
    #[error("component {0} has no render function")]
    MissingRender(String),

    /// Core error
    #[error("core error: {0}")]
    Core(#[from] reflux_core::Error),
}
