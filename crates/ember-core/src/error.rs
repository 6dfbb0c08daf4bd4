//! Errors reported outside the script error channel

use thiserror::Error;

/// Errors that can occur while setting up an interpreter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Options rejected before anything was allocated
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The core classes did not fit in the configured limits
    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),
}

/// Result alias for interpreter setup
pub type CoreResult<T> = Result<T, CoreError>;
