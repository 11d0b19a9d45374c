//! Error types for lecho.

use thiserror::Error;

/// Main error type for lecho operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid engine configuration.
    #[error("config error: {message}")]
    Config { message: String },

    /// A pattern (exclude list, style scan) failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// The session driver's channel to the embedder closed.
    #[error("session channel closed")]
    ChannelClosed,
}

impl Error {
    /// Shorthand for a [`Error::Config`] with a formatted message.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

/// Convenience result type for lecho operations.
pub type Result<T> = std::result::Result<T, Error>;
