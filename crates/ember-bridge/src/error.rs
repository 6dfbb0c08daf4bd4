//! Error types

use crate::object::Exception;
use ember_core::Value;
use thiserror::Error;

/// Result of an operation that can raise inside the runtime
pub type BridgeResult<T> = Result<T, Exception>;

/// Errors that can occur while opening a runtime
///
/// Every variant means nothing was leaked: whatever was allocated before the
/// failure has been released.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// Bridge user data could not be allocated
    #[error("failed to allocate bridge user data")]
    UserDataAlloc,

    /// The interpreter refused to start
    #[error("failed to initialize interpreter: {0}")]
    InterpreterInit(String),

    /// Creating the panic carrier raised
    #[error("failed to create panic carrier: {0}")]
    PanicCarrier(String),
}

/// Failure reported by a host callback
///
/// The trampoline turns it into a runtime raise: an exception object is
/// raised as is, a message becomes a `RuntimeError`. A raw value must be a
/// live exception object; anything else raises `TypeError`.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Re-raise a runtime exception
    #[error("{0}")]
    Exception(Exception),

    /// Raise a `RuntimeError` with this message
    #[error("{0}")]
    Message(String),

    /// Raise this runtime object as is
    #[error("raise {0:?}")]
    Raise(Value),
}

impl From<Exception> for CallbackError {
    fn from(exc: Exception) -> Self {
        CallbackError::Exception(exc)
    }
}

impl From<String> for CallbackError {
    fn from(message: String) -> Self {
        CallbackError::Message(message)
    }
}

impl From<&str> for CallbackError {
    fn from(message: &str) -> Self {
        CallbackError::Message(message.to_string())
    }
}

/// Owned error for code that outlives a [`crate::Context`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A runtime exception, flattened to `message (ClassName)`
    #[error("{0}")]
    Exception(String),

    /// Opening the runtime failed
    #[error(transparent)]
    Open(#[from] OpenError),
}

impl From<Exception> for BridgeError {
    fn from(exc: Exception) -> Self {
        BridgeError::Exception(exc.to_string())
    }
}
