// src/queue/queue.rs

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::errors::{RelayError, Result};
use crate::queue::command::QueuedCommand;
use crate::queue::{dispatch, CompletionEvent, QueueState};
use crate::session::{SessionBackend, SessionFactory};
use crate::types::Token;

/// Capacity of the completion event channel. Slow subscribers lag rather
/// than blocking the dispatch loop.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Depth limits with backpressure hysteresis.
#[derive(Debug, Clone, Copy)]
pub struct QueueLimits {
    /// Hard cap; `enqueue` fails with `QueueFull` at this depth.
    pub max_depth: usize,
    /// Processing→Backpressure above this depth.
    pub backpressure_high: usize,
    /// Backpressure→Processing below this depth.
    pub backpressure_low: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            backpressure_high: 800,
            backpressure_low: 200,
        }
    }
}

/// Mutable queue state guarded by one lock.
#[derive(Debug)]
pub(super) struct QueueInner {
    pub(super) pending: VecDeque<QueuedCommand>,
    pub(super) state: QueueState,
    pub(super) dispatcher_running: bool,
    pub(super) stop_requested: bool,
    /// True while the dispatch loop holds a popped command.
    pub(super) in_flight: bool,
}

/// The session owned by the dispatch loop, cached between commands when
/// reuse is enabled.
pub(super) struct SessionSlot {
    pub(super) factory: Box<dyn SessionFactory>,
    /// `(address, session)` of the last connection, kept only under reuse.
    pub(super) cached: Option<(String, Box<dyn SessionBackend>)>,
}

/// State shared between the queue handle and its dispatch loop.
pub(super) struct QueueShared {
    pub(super) limits: QueueLimits,
    pub(super) inner: Mutex<QueueInner>,
    pub(super) notify: Notify,
    pub(super) events: broadcast::Sender<CompletionEvent>,
    pub(super) next_id: AtomicU64,
    pub(super) session: tokio::sync::Mutex<SessionSlot>,
    /// Whether the session is kept connected across commands.
    pub(super) reuse_session: AtomicBool,
}

/// Bounded FIFO command queue with a single dispatch loop.
///
/// Guarantees:
/// - strict FIFO ordering, exactly-once execution;
/// - at most one command in flight at any time;
/// - depth never exceeds [`QueueLimits::max_depth`];
/// - state transitions follow the backpressure hysteresis.
///
/// External callers should go through the batch processor; calling
/// `start`/`stop` directly bypasses batch-level gating.
#[derive(Clone)]
pub struct CommandQueue {
    shared: Arc<QueueShared>,
}

impl CommandQueue {
    pub fn new(factory: Box<dyn SessionFactory>, limits: QueueLimits) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(QueueShared {
                limits,
                inner: Mutex::new(QueueInner {
                    pending: VecDeque::new(),
                    state: QueueState::Idle,
                    dispatcher_running: false,
                    stop_requested: false,
                    in_flight: false,
                }),
                notify: Notify::new(),
                events,
                next_id: AtomicU64::new(1),
                session: tokio::sync::Mutex::new(SessionSlot {
                    factory,
                    cached: None,
                }),
                reuse_session: AtomicBool::new(false),
            }),
        }
    }

    /// Append a command for the given resolved token.
    ///
    /// Fails with [`RelayError::QueueFull`] at max depth; callers seeing
    /// [`QueueState::Backpressure`] should throttle before that point.
    pub fn enqueue(&self, text: &str, token: Token, timeout: Duration) -> Result<u64> {
        let mut inner = self.shared.inner.lock().expect("queue lock poisoned");

        let depth = inner.pending.len();
        if depth >= self.shared.limits.max_depth {
            warn!(depth, "enqueue rejected: queue at max depth");
            return Err(RelayError::QueueFull {
                depth,
                max: self.shared.limits.max_depth,
            });
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let command = QueuedCommand::new(id, text.to_string(), token, timeout);

        debug!(
            command_id = id,
            node = %command.node,
            depth = depth + 1,
            "command enqueued"
        );

        inner.pending.push_back(command);
        recompute_state(&mut inner, &self.shared.limits);
        drop(inner);

        self.shared.notify.notify_one();
        Ok(id)
    }

    /// Start the dispatch loop. Idempotent: a re-entrant call while the
    /// loop is alive spawns nothing. Any terminal leftovers are purged
    /// first so a restart can never re-execute a completed command.
    pub fn start(&self) {
        let mut inner = self.shared.inner.lock().expect("queue lock poisoned");

        let before = inner.pending.len();
        inner.pending.retain(|c| !c.status.is_terminal());
        let purged = before - inner.pending.len();
        if purged > 0 {
            warn!(purged, "purged terminal commands before start");
        }

        inner.stop_requested = false;
        if inner.dispatcher_running {
            debug!("start() called while dispatch loop already running; ignoring");
            return;
        }
        inner.dispatcher_running = true;
        recompute_state(&mut inner, &self.shared.limits);
        drop(inner);

        info!("starting dispatch loop");
        let shared = Arc::clone(&self.shared);
        tokio::spawn(dispatch::run(shared));
    }

    /// Request the dispatch loop to stop. The in-flight command, if any,
    /// finishes naturally; half-written protocol state is worse than a
    /// late response.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock().expect("queue lock poisoned");
        inner.stop_requested = true;
        drop(inner);
        self.shared.notify.notify_one();
    }

    /// Subscribe to completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.shared.events.subscribe()
    }

    /// Current number of pending commands (excludes the in-flight one).
    pub fn depth(&self) -> usize {
        self.shared
            .inner
            .lock()
            .expect("queue lock poisoned")
            .pending
            .len()
    }

    /// Current backpressure state.
    pub fn state(&self) -> QueueState {
        self.shared.inner.lock().expect("queue lock poisoned").state
    }

    /// Whether a command with the given id is still queued.
    pub fn contains(&self, command_id: u64) -> bool {
        self.shared
            .inner
            .lock()
            .expect("queue lock poisoned")
            .pending
            .iter()
            .any(|c| c.id == command_id)
    }

    /// Toggle session reuse across commands. Takes effect from the next
    /// dispatched command.
    pub fn set_session_reuse(&self, reuse: bool) {
        self.shared.reuse_session.store(reuse, Ordering::Relaxed);
    }

    /// Drop any cached session, disconnecting it first. Used between batch
    /// tokens and by periodic housekeeping.
    pub async fn release_session(&self) {
        let mut slot = self.shared.session.lock().await;
        if let Some((addr, mut session)) = slot.cached.take() {
            debug!(addr = %addr, "releasing cached session");
            session.disconnect().await;
        }
    }
}

/// Recompute the state machine after an enqueue/dequeue. Runs under the
/// queue lock; no callbacks fire from here.
pub(super) fn recompute_state(inner: &mut QueueInner, limits: &QueueLimits) {
    let depth = inner.pending.len();
    let busy = depth > 0 || inner.in_flight;

    let next = match inner.state {
        QueueState::Idle => {
            if busy {
                QueueState::Processing
            } else {
                QueueState::Idle
            }
        }
        QueueState::Processing => {
            if !busy {
                QueueState::Idle
            } else if depth > limits.backpressure_high {
                QueueState::Backpressure
            } else {
                QueueState::Processing
            }
        }
        QueueState::Backpressure => {
            if !busy {
                QueueState::Idle
            } else if depth < limits.backpressure_low {
                QueueState::Processing
            } else {
                QueueState::Backpressure
            }
        }
    };

    if next != inner.state {
        debug!(from = ?inner.state, to = ?next, depth, "queue state transition");
        inner.state = next;
    }
}
