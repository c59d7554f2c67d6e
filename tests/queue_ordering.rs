// tests/queue_ordering.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::time::Duration;

use tokio::time::timeout;

use noderelay::queue::{CommandQueue, CommandStatus, QueueLimits};
use noderelay::types::Protocol;
use noderelay_test_utils::TokenBuilder;
use noderelay_test_utils::fake_session::FakeSessionFactory;

type TestResult = Result<(), Box<dyn Error>>;

const WAIT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn completions_arrive_in_fifo_order() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());
    let mut rx = queue.subscribe();

    let mut ids = Vec::new();
    for id in ["162", "163", "164"] {
        let token = TokenBuilder::new(id, Protocol::Fbc).build();
        ids.push(queue.enqueue(&format!("READ {id}"), token, WAIT)?);
    }

    queue.start();

    for expected in &ids {
        let event = timeout(WAIT, rx.recv()).await??;
        assert_eq!(event.command_id, *expected);
        assert_eq!(event.status, CommandStatus::Done);
        assert_eq!(event.response.as_deref(), Some("OK"));
    }

    assert_eq!(
        script.sent(),
        vec!["READ 162", "READ 163", "READ 164"],
        "commands must hit the session in enqueue order"
    );

    queue.stop();
    Ok(())
}

#[tokio::test]
async fn completed_commands_are_never_re_executed() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());
    let mut rx = queue.subscribe();

    let token = TokenBuilder::new("162", Protocol::Fbc).build();
    let first = queue.enqueue("READ 162", token.clone(), WAIT)?;

    queue.start();

    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.command_id, first);
    assert!(!queue.contains(first), "completed command must leave the deque");

    // Re-entrant start must not spawn a second loop or replay anything.
    queue.start();
    queue.start();

    let second = queue.enqueue("READ 162 AGAIN", token, WAIT)?;
    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.command_id, second);

    // Exactly two sends total: one per command, no replays.
    assert_eq!(script.sent().len(), 2);

    queue.stop();
    Ok(())
}

#[tokio::test]
async fn stop_immediately_followed_by_start_keeps_dispatching() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());
    let mut rx = queue.subscribe();
    let token = TokenBuilder::new("162", Protocol::Fbc).build();

    let first = queue.enqueue("READ 162", token.clone(), WAIT)?;
    queue.start();
    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.command_id, first);

    // Back-to-back stop/start: whichever way the old loop's teardown
    // interleaves with the new start, later commands must still run.
    queue.stop();
    queue.start();

    let second = queue.enqueue("READ 162 AGAIN", token, WAIT)?;
    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.command_id, second);
    assert_eq!(script.sent().len(), 2);

    queue.stop();
    Ok(())
}

#[tokio::test]
async fn enqueue_resumes_a_parked_dispatch_loop() -> TestResult {
    init_tracing();

    let (factory, _script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());
    let mut rx = queue.subscribe();

    // Start with an empty queue; the loop parks immediately.
    queue.start();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let token = TokenBuilder::new("162", Protocol::Fbc).build();
    let id = queue.enqueue("READ 162", token, WAIT)?;

    // No explicit restart needed.
    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.command_id, id);

    queue.stop();
    Ok(())
}

#[tokio::test]
async fn temporary_tokens_fail_at_dispatch() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());
    let mut rx = queue.subscribe();

    let token = TokenBuilder::new("999", Protocol::Rpc).ip("0.0.0.0").build();
    queue.enqueue("READ 999", token, WAIT)?;
    queue.start();

    let event = timeout(WAIT, rx.recv()).await??;
    assert_eq!(event.status, CommandStatus::Failed);
    assert!(event.failure.is_some());

    // The session must never be touched for an unaddressed token.
    assert!(script.connects().is_empty());

    queue.stop();
    Ok(())
}
