// src/queue/dispatch.rs

//! The single dispatch loop: pop head, run the session call under its
//! deadline, emit the completion event, loop. Execution is strictly
//! single-flight; the endpoint cannot parse interleaved request/response
//! pairs, so a second command never starts before the previous one's
//! session call returns or times out.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::queue::command::{CommandStatus, QueuedCommand};
use crate::queue::queue::{recompute_state, QueueShared};
use crate::queue::{validate_response, CommandFailure, CompletionEvent, ResponseShape};

enum Pop {
    Command(QueuedCommand),
    Empty,
    Stop,
}

/// Run the dispatch loop until stop is requested.
///
/// The loop parks on the queue's `Notify` when empty and is woken by
/// `enqueue` or `stop`; it never needs an explicit restart to resume.
pub(super) async fn run(shared: Arc<QueueShared>) {
    info!("dispatch loop started");

    loop {
        // Register for wakeups before checking the queue so an enqueue
        // racing with the check cannot be missed.
        let notified = shared.notify.notified();

        match pop_next(&shared) {
            Pop::Stop => {
                if finish(&shared).await {
                    break;
                }
                // A start() raced with the teardown and cleared the stop
                // request while we still counted as running; its commands
                // would have no dispatcher if we exited now.
                debug!("stop raced with start; dispatch loop resuming");
            }
            Pop::Command(cmd) => execute_one(&shared, cmd).await,
            Pop::Empty => notified.await,
        }
    }

    info!("dispatch loop stopped");
}

/// Tear the loop down: drop any cached session and clear the running flag.
///
/// Returns false when the stop request was withdrawn mid-teardown by a
/// concurrent `start()`; the loop must resume in that case.
async fn finish(shared: &Arc<QueueShared>) -> bool {
    {
        let mut slot = shared.session.lock().await;
        if let Some((addr, mut session)) = slot.cached.take() {
            debug!(addr = %addr, "dispatch loop releasing cached session on stop");
            session.disconnect().await;
        }
    }

    let mut inner = shared.inner.lock().expect("queue lock poisoned");
    if !inner.stop_requested {
        return false;
    }
    inner.dispatcher_running = false;
    recompute_state(&mut inner, &shared.limits);
    true
}

fn pop_next(shared: &Arc<QueueShared>) -> Pop {
    let mut inner = shared.inner.lock().expect("queue lock poisoned");

    if inner.stop_requested {
        return Pop::Stop;
    }

    match inner.pending.pop_front() {
        Some(mut cmd) => {
            cmd.status = CommandStatus::Running;
            inner.in_flight = true;
            recompute_state(&mut inner, &shared.limits);
            Pop::Command(cmd)
        }
        None => {
            recompute_state(&mut inner, &shared.limits);
            Pop::Empty
        }
    }
}

async fn execute_one(shared: &Arc<QueueShared>, mut cmd: QueuedCommand) {
    debug!(
        command_id = cmd.id,
        node = %cmd.node,
        text = %cmd.text,
        "dispatching command"
    );

    let outcome = send_with_session(shared, &cmd).await;

    let (response, failure) = match outcome {
        Ok(response) => {
            // Permissive policy: a malformed response is a warning, not a
            // command failure.
            if let ResponseShape::Malformed(reason) = validate_response(&response) {
                warn!(
                    command_id = cmd.id,
                    node = %cmd.node,
                    reason,
                    "malformed response; marking command done anyway"
                );
            }
            cmd.status = CommandStatus::Done;
            (Some(response), None)
        }
        Err(failure) => {
            warn!(
                command_id = cmd.id,
                node = %cmd.node,
                failure = ?failure,
                "command failed"
            );
            cmd.status = CommandStatus::Failed;
            (None, Some(failure))
        }
    };

    {
        let mut inner = shared.inner.lock().expect("queue lock poisoned");
        inner.in_flight = false;
        recompute_state(&mut inner, &shared.limits);
    }

    // Nobody listening is fine; the queue works headless.
    let _ = shared.events.send(CompletionEvent {
        command_id: cmd.id,
        token: cmd.token,
        status: cmd.status,
        response,
        failure,
    });
}

/// Run the session call for one command under its deadline.
///
/// The session slot is held for the whole call; ownership of the
/// connection is exclusive to this loop while a command is in flight. On
/// timeout or session error the connection is dropped rather than reused —
/// its protocol state is unknown.
async fn send_with_session(
    shared: &Arc<QueueShared>,
    cmd: &QueuedCommand,
) -> Result<String, CommandFailure> {
    if !cmd.token.has_address() {
        return Err(CommandFailure::Session(format!(
            "token {} on {} has no usable address; cannot execute",
            cmd.token.id, cmd.token.node
        )));
    }

    let reuse = shared.reuse_session.load(Ordering::Relaxed);
    let addr = cmd.token.address();

    let mut slot = shared.session.lock().await;

    let mut session = match slot.cached.take() {
        Some((cached_addr, session)) if reuse && cached_addr == addr => {
            debug!(addr = %addr, "reusing cached session");
            session
        }
        other => {
            if let Some((old_addr, mut old)) = other {
                debug!(old_addr = %old_addr, "discarding cached session for different target");
                old.disconnect().await;
            }
            slot.factory
                .connect(&cmd.token)
                .await
                .map_err(|e| CommandFailure::Session(e.to_string()))?
        }
    };

    match tokio::time::timeout(cmd.timeout, session.send(&cmd.text)).await {
        Err(_elapsed) => {
            session.disconnect().await;
            Err(CommandFailure::Timeout {
                timeout_secs: cmd.timeout.as_secs(),
            })
        }
        Ok(Err(e)) => {
            session.disconnect().await;
            Err(CommandFailure::Session(e.to_string()))
        }
        Ok(Ok(response)) => {
            if reuse {
                slot.cached = Some((addr, session));
            } else {
                session.disconnect().await;
            }
            Ok(response)
        }
    }
}
