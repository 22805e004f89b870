use thiserror::Error;

use crate::usage::UsageMetadata;

/// Failure while dispatching a single tool call. Never fatal to a run: the loop
/// turns it into a tool-role error message for the model to react to.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("tool execution failed: {0}")]
    ExecutionError(String),
}

impl DispatchError {
    /// Text handed back to the model. Handler and argument errors are passed on as
    /// they were raised, an unknown tool is named.
    pub fn envelope_message(&self) -> String {
        match self {
            DispatchError::ToolNotFound(_) => self.to_string(),
            DispatchError::InvalidParameters(message) | DispatchError::ExecutionError(message) => {
                message.clone()
            }
        }
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that end a completion loop run (or reject a configuration change).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("provider request failed: {0:#}")]
    Provider(anyhow::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("tool-calling loop exceeded {0} iterations")]
    MaxIterationsExceeded(usize),

    #[error("no registered tool named '{name}' for call {id}")]
    UnresolvedToolCall { id: String, name: String },
}

/// The error side of a run: what went wrong plus the usage spent before it did.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct LoopFailure {
    pub error: LoopError,
    pub usage: UsageMetadata,
}

impl LoopFailure {
    pub fn new(error: LoopError, usage: UsageMetadata) -> Self {
        Self { error, usage }
    }
}
