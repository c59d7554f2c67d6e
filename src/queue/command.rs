// src/queue/command.rs

//! The queued command record and its lifecycle.

use std::time::{Duration, Instant};

use crate::types::{NodeName, Token};

/// Lifecycle of a queued command.
///
/// `Pending` while in the deque, `Running` while its session call is in
/// flight (at most one command is ever `Running`), then `Done` or `Failed`.
/// Terminal commands are removed from the queue immediately; they never
/// linger where a later `start()` could pick them up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Done | CommandStatus::Failed)
    }
}

/// One command owned by the queue until it reaches a terminal status.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    /// Monotonic per-queue id.
    pub id: u64,
    pub text: String,
    pub node: NodeName,
    pub token: Token,
    pub enqueued_at: Instant,
    pub status: CommandStatus,
    /// Absolute per-command deadline, relative to dispatch.
    pub timeout: Duration,
}

impl QueuedCommand {
    pub fn new(id: u64, text: String, token: Token, timeout: Duration) -> Self {
        Self {
            id,
            text,
            node: token.node.clone(),
            token,
            enqueued_at: Instant::now(),
            status: CommandStatus::Pending,
            timeout,
        }
    }
}
