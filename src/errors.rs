// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Command queue is full (depth {depth}, max {max})")]
    QueueFull { depth: usize, max: usize },

    #[error("Command {command_id} timed out after {timeout_secs}s")]
    CommandTimeout { command_id: u64, timeout_secs: u64 },

    #[error("Circuit breaker tripped after {failures} consecutive failures")]
    CircuitBreakerTripped { failures: u32 },

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RelayError>;
