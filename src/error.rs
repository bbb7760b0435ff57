//! Error types for the taskmill engine.

use thiserror::Error;

/// Top-level error type for engine construction and broker operations.
#[derive(Debug, Error)]
pub enum TaskmillError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Broker error: {0}")]
    BrokerError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Unknown task: {0}")]
    UnknownTask(String),
    #[error("Invocation error: {0}")]
    InvocationError(#[from] InvokeError),
    #[error("Execution failure: {0}")]
    ExecutionFailure(String),
}

impl From<redis::RedisError> for TaskmillError {
    fn from(error: redis::RedisError) -> Self {
        TaskmillError::BrokerError(error.to_string())
    }
}

impl From<serde_json::Error> for TaskmillError {
    fn from(error: serde_json::Error) -> Self {
        TaskmillError::SerializationError(error.to_string())
    }
}

/// Errors raised while binding loosely-typed arguments to a handler's
/// declared parameters. These surface at the invocation boundary and are
/// never propagated past the worker or async-call loops.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("handler takes {expected} arguments, {supplied} were supplied")]
    Arity { expected: usize, supplied: usize },
    #[error("variadic handler takes at least {expected} arguments, {supplied} were supplied")]
    ArityVariadic { expected: usize, supplied: usize },
    #[error("argument {position} could not be decoded: {reason}")]
    Decode { position: usize, reason: String },
    #[error("argument {position} has an unexpected runtime type")]
    TypeMismatch { position: usize },
}

pub type Result<T> = std::result::Result<T, TaskmillError>;
