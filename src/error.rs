//! Error types for the NutriBot relay.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures talking to the hosted agent service.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent request {operation} failed: {reason}")]
    RequestFailed { operation: String, reason: String },

    #[error("Agent service rejected credentials during {operation}")]
    AuthFailed { operation: String },

    #[error("Agent service rate limited {operation}")]
    RateLimited { operation: String },

    #[error("Invalid response from agent service during {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    #[error("Agent run {run_id} ended with status {status}: {reason}")]
    RunFailed {
        run_id: String,
        status: String,
        reason: String,
    },

    #[error("Agent service unavailable: no answer within {0:?}")]
    Timeout(Duration),
}

impl AgentError {
    /// Whether this failure means the collaborator never answered in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors surfaced by a chat turn or preference update.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Agent(#[from] AgentError),
}
