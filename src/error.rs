use std::time::Duration;
use thiserror::Error;

/// Errors raised when building a flow plan from descriptors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Flows '{first}' and '{second}' both start at node {start_node}")]
    OverlappingStart {
        first: String,
        second: String,
        start_node: i64,
    },

    #[error("Flow name '{0}' is used more than once")]
    DuplicateName(String),

    #[error("Flow '{name}' starts at {start_node}, outside the assignable range [0, {threshold})")]
    StartOutOfRange {
        name: String,
        start_node: i64,
        threshold: i64,
    },

    #[error("No free node block is left below the system threshold")]
    RangeExhausted,
}

/// Errors raised while talking to the remote compiler. Definitive answers
/// (accepted, rejected, rate limited, unauthorized) are outcomes, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Compiler call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Compiler server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected compiler response: {0}")]
    Protocol(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CompilerError {
    /// Whether retrying the same submission later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompilerError::Network(_) | CompilerError::Timeout(_) | CompilerError::Server { .. }
        )
    }
}

/// Errors raised by the AI patch service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Patch request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Patch service rate limit exceeded: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Patch service rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Patch service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Patch response could not be used: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            PatchError::Network(_) | PatchError::Timeout(_) | PatchError::RateLimited { .. } => {
                true
            }
            PatchError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Conditions that end a repair session without the artifact being accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepairError {
    #[error("Gave up after {attempts} consecutive transient failures; last: {last}")]
    RetryBudgetExhausted { attempts: u32, last: String },

    #[error("Remote compiler failed: {0}")]
    Compiler(#[from] CompilerError),

    #[error("Patch service failed: {0}")]
    Patch(#[from] PatchError),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
