// tests/batch_recovery.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use noderelay::batch::{BatchOptions, SequentialBatchProcessor};
use noderelay::logwriter::LogRegistry;
use noderelay::queue::{CommandQueue, QueueLimits};
use noderelay::types::Protocol;
use noderelay_test_utils::fake_session::FakeSessionFactory;
use noderelay_test_utils::TokenBuilder;

type TestResult = Result<(), Box<dyn Error>>;

fn options() -> BatchOptions {
    BatchOptions {
        command_timeout: Duration::from_secs(2),
        ..BatchOptions::default()
    }
}

#[tokio::test]
async fn full_queue_is_retried_until_space_frees() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    // Depth 1: the pre-loaded filler occupies the only slot, so the
    // batch's first enqueue attempt is rejected and must be retried once
    // the dispatch loop drains the filler.
    let limits = QueueLimits {
        max_depth: 1,
        backpressure_high: 1,
        backpressure_low: 1,
    };
    let queue = CommandQueue::new(Box::new(factory), limits);

    let filler = TokenBuilder::new("900", Protocol::Fbc).build();
    queue.enqueue("FILLER", filler, Duration::from_secs(2))?;

    let root = tempfile::tempdir()?;
    let registry = Arc::new(LogRegistry::new(root.path()));
    let processor = SequentialBatchProcessor::new(queue.clone(), registry);

    let tokens = vec![TokenBuilder::new("162", Protocol::Fbc).build()];
    let result = processor.process_batch(tokens, "READ {id}", options()).await?;

    assert_eq!(result.success, 1);
    assert_eq!(result.failure, 0);
    assert_eq!(script.sent(), vec!["FILLER", "READ 162"]);

    queue.stop();
    Ok(())
}

#[tokio::test]
async fn failed_log_writes_warn_but_do_not_abort() -> TestResult {
    init_tracing();

    let (factory, script) = FakeSessionFactory::new();
    let queue = CommandQueue::new(Box::new(factory), QueueLimits::default());

    let root = tempfile::tempdir()?;
    // Occupy the token's log path with a directory so the handle can never
    // be opened; both the initial append and its retry fail.
    let log_path = root
        .path()
        .join("FBC/AP01m/AP01m_192-168-0-11_162.fbc");
    fs::create_dir_all(&log_path)?;

    let registry = Arc::new(LogRegistry::new(root.path()));
    let processor = SequentialBatchProcessor::new(queue.clone(), registry);

    let tokens = vec![TokenBuilder::new("162", Protocol::Fbc).build()];
    let result = processor.process_batch(tokens, "READ {id}", options()).await?;

    assert_eq!(result.success, 1);
    assert_eq!(result.failure, 0);
    assert_eq!(script.sent(), vec!["READ 162"]);

    queue.stop();
    Ok(())
}
