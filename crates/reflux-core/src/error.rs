//! Error types for reflux-core

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// A getter, callback or hook failed while running
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Type error: expected {expected}, got {got}")]
    TypeError { expected: String, got: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// `set`/`delete` applied to something that is not a container
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The rendering collaborator failed to produce or apply a tree
    #[error("Render error: {0}")]
    Render(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a user-raised evaluation failure
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
