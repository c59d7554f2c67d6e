// src/batch/mod.rs

//! Sequential batch processing on top of the command queue.
//!
//! Batches run a list of tokens against one command template, one token at
//! a time: the next token is only enqueued after the previous token's
//! completion event has been observed. The queue alone guarantees
//! per-queue ordering; this layer adds per-batch gating so a batch never
//! floods the queue and the shared session never sees interleaved
//! command/response pairs.
//!
//! UI collaborators trigger batches through
//! [`SequentialBatchProcessor::process_batch`] and must not start/stop the
//! queue directly.

use std::time::Duration;

pub mod context;
pub mod processor;

pub use context::BatchContext;
pub use processor::SequentialBatchProcessor;

/// Consecutive failures after which a batch halts. Protects an unreachable
/// node from being hammered for the rest of the batch.
pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 3;

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default housekeeping cadence (tokens between resource cleanups).
pub const DEFAULT_HOUSEKEEPING_INTERVAL: usize = 25;

/// Per-batch options.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub command_timeout: Duration,
    /// Keep the session connected between tokens instead of releasing it.
    pub reuse_session: bool,
    /// Release resources every this many tokens; 0 disables housekeeping.
    pub housekeeping_interval: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            reuse_session: false,
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
        }
    }
}

/// Progress/status events produced while a batch runs.
///
/// Consumed by a UI collaborator when one is wired up; otherwise inert.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Progress { current: usize, total: usize },
    Status { text: String, duration_ms: u64 },
    Finished { success: usize, total: usize },
}

/// Terminal outcome of one token within a batch.
///
/// `Skipped` is reported for tokens never attempted (circuit breaker or
/// cancellation) and is distinct from `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOutcome {
    Success,
    Failed,
    TimedOut,
    Skipped,
}

/// Aggregated counts returned by a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub success: usize,
    /// Failed tokens, timeouts included.
    pub failure: usize,
    /// How many of the failures were timeouts.
    pub timeouts: usize,
    pub skipped: usize,
    pub total: usize,
    pub halted_by_circuit_breaker: bool,
}
