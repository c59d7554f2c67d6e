// src/batch/processor.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch::{BatchContext, BatchEvent, BatchOptions, BatchResult};
use crate::errors::{RelayError, Result};
use crate::logwriter::{BatchLog, LogRegistry};
use crate::queue::{CommandFailure, CommandQueue, CommandStatus, CompletionEvent};
use crate::resolve::normalize_token_id;
use crate::types::Token;

/// Grace added on top of the per-command timeout when waiting for the
/// completion event; the dispatch loop enforces the real deadline.
const COMPLETION_GRACE: Duration = Duration::from_secs(5);

/// Backoff schedule for a full queue. The queue drains between tokens by
/// construction, so retries beyond a few are pointless.
const QUEUE_FULL_RETRIES: u32 = 5;
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(100);

/// Runs token lists one at a time against the command queue.
///
/// Isolation and containment per batch:
/// - completion-based chaining (never two tokens enqueued concurrently)
/// - circuit breaker on consecutive failures, remaining tokens `Skipped`
/// - per-token log handles via the registry, batch-level log per node
/// - session released between tokens unless reuse was requested
/// - periodic housekeeping to bound resource growth on very large batches
pub struct SequentialBatchProcessor {
    queue: CommandQueue,
    registry: Arc<LogRegistry>,
    events: Option<mpsc::Sender<BatchEvent>>,
    stop_requested: Arc<AtomicBool>,
}

impl SequentialBatchProcessor {
    pub fn new(queue: CommandQueue, registry: Arc<LogRegistry>) -> Self {
        Self {
            queue,
            registry,
            events: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Wire up a progress event channel (consumed by a UI collaborator).
    pub fn with_events(mut self, events: mpsc::Sender<BatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Request the running batch to stop. The in-flight command finishes;
    /// remaining tokens are reported as skipped.
    pub fn stop_processing(&self) {
        self.stop_requested.store(true, Ordering::Relaxed);
    }

    /// Run `template` against every token in order.
    ///
    /// Tokens are expected to be resolved already (the resolver never
    /// returns dangling references; temporary tokens fail at dispatch and
    /// count as failures here).
    pub async fn process_batch(
        &self,
        tokens: Vec<Token>,
        template: &str,
        options: BatchOptions,
    ) -> Result<BatchResult> {
        let batch_id = Uuid::new_v4();
        let total = tokens.len();
        let mut ctx = BatchContext::new(batch_id, total);

        self.stop_requested.store(false, Ordering::Relaxed);
        self.queue.set_session_reuse(options.reuse_session);
        self.queue.start();

        let mut completions = self.queue.subscribe();

        // Batch log lives under the first token's node; batches span the
        // tokens of one physical node in practice. Losing it is a warning,
        // not a reason to abandon the tokens.
        let mut batch_log = match tokens.first() {
            Some(token) => match self.registry.open_batch_log(&token.node) {
                Ok(log) => Some(log),
                Err(e) => {
                    warn!(
                        node = %token.node,
                        error = %e,
                        "could not open batch log; continuing without it"
                    );
                    None
                }
            },
            None => None,
        };
        self.batch_log_line(
            &mut batch_log,
            &format!("batch {batch_id} started: {total} tokens, template '{template}'"),
        );

        info!(batch_id = %batch_id, total, "batch started");
        let batch_started = Instant::now();

        for (idx, token) in tokens.iter().enumerate() {
            if self.stop_requested.load(Ordering::Relaxed) {
                ctx.cancel();
            }

            if ctx.is_cancelled() || ctx.breaker_tripped() {
                ctx.record_skipped();
                self.batch_log_line(
                    &mut batch_log,
                    &format!("token {} skipped", display_id(token)),
                );
                self.emit(BatchEvent::Progress {
                    current: idx + 1,
                    total,
                });
                continue;
            }

            self.run_token(token, template, &options, &mut ctx, &mut completions, &mut batch_log)
                .await;

            if ctx.breaker_tripped() {
                warn!(
                    batch_id = %batch_id,
                    failures = ctx.consecutive_failures(),
                    "circuit breaker tripped; skipping remaining tokens"
                );
                self.emit(BatchEvent::Status {
                    text: format!(
                        "circuit breaker tripped after {} consecutive failures",
                        ctx.consecutive_failures()
                    ),
                    duration_ms: batch_started.elapsed().as_millis() as u64,
                });
                self.batch_log_line(
                    &mut batch_log,
                    &format!(
                        "circuit breaker tripped after {} consecutive failures",
                        ctx.consecutive_failures()
                    ),
                );
            }

            if !options.reuse_session {
                self.queue.release_session().await;
            }

            if options.housekeeping_interval > 0
                && (idx + 1) % options.housekeeping_interval == 0
            {
                self.housekeeping().await;
            }

            self.emit(BatchEvent::Progress {
                current: idx + 1,
                total,
            });
        }

        // Release the session deterministically at batch end regardless of
        // the reuse setting.
        self.queue.release_session().await;

        let success = ctx.success_count();
        self.emit(BatchEvent::Finished { success, total });

        let result = ctx.into_result();
        self.batch_log_line(
            &mut batch_log,
            &format!(
                "batch {batch_id} finished: {} ok, {} failed ({} timeouts), {} skipped of {}",
                result.success, result.failure, result.timeouts, result.skipped, result.total
            ),
        );
        info!(
            batch_id = %batch_id,
            success = result.success,
            failure = result.failure,
            timeouts = result.timeouts,
            skipped = result.skipped,
            elapsed_ms = batch_started.elapsed().as_millis() as u64,
            "batch finished"
        );

        Ok(result)
    }

    /// Execute one token: open its log, enqueue, await that command's
    /// completion, record the outcome.
    async fn run_token(
        &self,
        token: &Token,
        template: &str,
        options: &BatchOptions,
        ctx: &mut BatchContext,
        completions: &mut broadcast::Receiver<CompletionEvent>,
        batch_log: &mut Option<BatchLog>,
    ) {
        let id_display = display_id(token);

        if let Err(e) = self.registry.open(token) {
            warn!(token = %id_display, error = %e, "could not open token log; continuing");
            self.batch_log_line(
                batch_log,
                &format!("token {id_display}: log open failed: {e}"),
            );
        }

        let text = render_template(template, token);

        let command_id = match self
            .enqueue_with_retry(&text, token, options.command_timeout)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(token = %id_display, error = %e, "enqueue failed");
                ctx.record_failure(false);
                self.batch_log_line(
                    batch_log,
                    &format!("token {id_display}: enqueue failed: {e}"),
                );
                return;
            }
        };

        debug!(token = %id_display, command_id, "token enqueued; waiting for completion");

        let event = wait_for_completion(
            completions,
            command_id,
            options.command_timeout + COMPLETION_GRACE,
        )
        .await;

        match event {
            Some(event) if event.status == CommandStatus::Done => {
                ctx.record_success();
                let response = event.response.as_deref().unwrap_or("");
                self.append_with_retry(token, response, batch_log);
                self.batch_log_line(batch_log, &format!("token {id_display}: ok"));
            }
            Some(event) => {
                let timed_out =
                    matches!(event.failure, Some(CommandFailure::Timeout { .. }));
                ctx.record_failure(timed_out);

                let detail = match &event.failure {
                    Some(CommandFailure::Timeout { timeout_secs }) => {
                        format!("timed out after {timeout_secs}s")
                    }
                    Some(CommandFailure::Session(msg)) => format!("session error: {msg}"),
                    None => "failed".to_string(),
                };
                self.append_with_retry(token, &format!("<{detail}>"), batch_log);
                self.batch_log_line(
                    batch_log,
                    &format!("token {id_display}: {detail}"),
                );
            }
            None => {
                // Completion channel closed or the event never arrived
                // within the guard window; count it as a failure.
                warn!(token = %id_display, command_id, "no completion event observed");
                ctx.record_failure(false);
                self.batch_log_line(
                    batch_log,
                    &format!("token {id_display}: no completion event"),
                );
            }
        }
    }

    async fn enqueue_with_retry(
        &self,
        text: &str,
        token: &Token,
        timeout: Duration,
    ) -> Result<u64> {
        let mut attempt = 0;
        loop {
            match self.queue.enqueue(text, token.clone(), timeout) {
                Ok(id) => return Ok(id),
                Err(RelayError::QueueFull { .. }) if attempt < QUEUE_FULL_RETRIES => {
                    attempt += 1;
                    debug!(attempt, "queue full; backing off before retry");
                    tokio::time::sleep(QUEUE_FULL_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Log-write IO errors are retried once, then surfaced as a batch
    /// warning without aborting the batch.
    fn append_with_retry(
        &self,
        token: &Token,
        content: &str,
        batch_log: &mut Option<BatchLog>,
    ) {
        if self.registry.append(token, content).is_ok() {
            return;
        }
        match self.registry.append(token, content) {
            Ok(()) => {}
            Err(e) => {
                warn!(token = %display_id(token), error = %e, "log write failed twice; giving up");
                self.batch_log_line(
                    batch_log,
                    &format!("token {}: log write failed: {e}", display_id(token)),
                );
            }
        }
    }

    /// Periodic resource cleanup: drop the cached session and close idle
    /// log handles (they reopen on demand). Bounds memory growth on very
    /// large batches.
    async fn housekeeping(&self) {
        debug!(
            open_handles = self.registry.open_handles(),
            "batch housekeeping"
        );
        self.queue.release_session().await;
        self.registry.close_all();
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            // A slow or absent consumer must not stall the batch.
            let _ = tx.try_send(event);
        }
    }

    fn batch_log_line(&self, batch_log: &mut Option<BatchLog>, line: &str) {
        if let Some(log) = batch_log {
            if let Err(e) = log.append(line) {
                warn!(error = %e, "batch log write failed");
            }
        }
    }
}

/// Render the command template for a token. `{id}` expands to the
/// normalized id, `{node}` and `{ip}` to the token's node and address.
pub fn render_template(template: &str, token: &Token) -> String {
    template
        .replace("{id}", &normalize_token_id(&token.id, token.kind))
        .replace("{node}", &token.node)
        .replace("{ip}", &token.ip)
}

fn display_id(token: &Token) -> String {
    format!("{}/{}", normalize_token_id(&token.id, token.kind), token.kind)
}

/// Wait for the completion event of a specific command, skipping events
/// for other commands (other subscribers may share the queue).
async fn wait_for_completion(
    rx: &mut broadcast::Receiver<CompletionEvent>,
    command_id: u64,
    guard: Duration,
) -> Option<CompletionEvent> {
    let deadline = Instant::now() + guard;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }

        match tokio::time::timeout(remaining, rx.recv()).await {
            Err(_elapsed) => return None,
            Ok(Ok(event)) if event.command_id == command_id => return Some(event),
            Ok(Ok(_other)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!(skipped, "completion subscriber lagged");
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;

    #[test]
    fn template_substitutes_all_placeholders() {
        let token = Token {
            id: "7".to_string(),
            kind: Protocol::Fbc,
            node: "AP01m".to_string(),
            ip: "192.168.0.11".to_string(),
            port: 23,
            transport: "telnet".to_string(),
        };
        let rendered = render_template("READ {node} {id} @{ip}", &token);
        assert_eq!(rendered, "READ AP01m 007 @192.168.0.11");
    }
}
