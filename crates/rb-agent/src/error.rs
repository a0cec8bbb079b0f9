//! Error types for the agent and its collaborators.

use std::time::Duration;

use rb_compiler::ParseError;

/// Policy source fetch failure.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error! status: {0}")]
    Status(u16),
}

/// Liveness probe failure. Never fatal: the fallback chain moves on.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("No response within {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid stored value for '{key}': {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Rule update rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Navigation sink closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Fetch failed. Rules were cleared.
    #[error("Policy source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    /// Parse failed. Rules were cleared.
    #[error("Malformed policy document: {0}")]
    MalformedDocument(#[from] ParseError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Filtering engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Navigation error: {0}")]
    Sink(#[from] SinkError),
    #[error("Options are locked")]
    Locked,
    #[error("Policy URL is managed by an administrator")]
    Managed,
}

pub type Result<T> = std::result::Result<T, AgentError>;
