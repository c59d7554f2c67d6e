// src/queue/mod.rs

//! Bounded FIFO command queue with single-flight dispatch.
//!
//! This module ties together:
//! - the queued command record and its lifecycle ([`command`])
//! - the queue state machine with backpressure hysteresis ([`queue`])
//! - the single dispatch loop that owns the session while a command is in
//!   flight ([`dispatch`])
//!
//! Callers outside this crate should submit work through the batch
//! processor rather than starting/stopping the queue directly; the batch
//! layer is what provides per-batch gating on top of per-queue ordering.

use crate::types::Token;

pub mod command;
pub mod dispatch;
pub mod queue;

pub use command::{CommandStatus, QueuedCommand};
pub use queue::{CommandQueue, QueueLimits};

/// Marker some endpoints embed in a reply that reports an internal fault.
/// Such replies are malformed, not command failures; see [`validate_response`].
pub const INTERNAL_ERROR_MARKER: &str = "%INTERNAL-ERROR%";

/// Queue state exposed to callers for backpressure.
///
/// Transitions (recomputed under the queue lock after every enqueue and
/// dequeue): Idle→Processing on first enqueue; Processing→Backpressure when
/// depth exceeds the high watermark; Backpressure→Processing when depth
/// falls below the low watermark (hysteresis prevents flapping);
/// Processing→Idle at depth zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Idle,
    Processing,
    Backpressure,
}

/// Why a dispatched command failed.
///
/// Timeouts are kept distinct from protocol-level session errors so the
/// batch layer can tally them separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandFailure {
    /// The per-command deadline elapsed before the session replied.
    Timeout { timeout_secs: u64 },
    /// The session itself failed (connect, write, read, peer closed).
    Session(String),
}

/// Delivered to subscribers after each command reaches a terminal status.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    pub command_id: u64,
    pub token: Token,
    pub status: CommandStatus,
    pub response: Option<String>,
    pub failure: Option<CommandFailure>,
}

/// Shape check applied to every response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    Ok,
    Malformed(&'static str),
}

/// Validate a response against the minimal shape contract.
///
/// Malformed responses are a warning, not a command failure: the command is
/// still marked Done so the pipeline keeps moving.
pub fn validate_response(response: &str) -> ResponseShape {
    if response.trim().is_empty() {
        return ResponseShape::Malformed("empty response");
    }
    if response.contains(INTERNAL_ERROR_MARKER) {
        return ResponseShape::Malformed("internal error marker in response");
    }
    ResponseShape::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_is_malformed() {
        assert_eq!(
            validate_response("   "),
            ResponseShape::Malformed("empty response")
        );
    }

    #[test]
    fn marker_response_is_malformed() {
        let resp = format!("status {INTERNAL_ERROR_MARKER} detail");
        assert!(matches!(
            validate_response(&resp),
            ResponseShape::Malformed(_)
        ));
    }

    #[test]
    fn normal_response_is_ok() {
        assert_eq!(validate_response("OK 162 READY"), ResponseShape::Ok);
    }
}
