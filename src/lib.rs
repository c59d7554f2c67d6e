// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod logwriter;
pub mod queue;
pub mod resolve;
pub mod session;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::batch::{BatchEvent, BatchOptions, SequentialBatchProcessor};
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::errors::{RelayError, Result};
use crate::logwriter::LogRegistry;
use crate::queue::{CommandQueue, QueueLimits};
use crate::resolve::TokenResolver;
use crate::session::TcpSessionFactory;
use crate::types::{Protocol, Token};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - node inventory loading
/// - token resolution + dynamic IP discovery
/// - command queue / dispatch loop
/// - sequential batch processor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let inventory = load_and_validate(&args.nodes)?;
    let resolver = TokenResolver::from_nodes(inventory.into_nodes());

    let log_root = PathBuf::from(&args.log_root);

    // Opportunistic IP repair from artifacts of earlier sessions.
    resolve::scan_for_dynamic_ips(&resolver, &log_root)?;

    let protocol: Protocol = args
        .protocol
        .parse()
        .map_err(RelayError::ConfigError)?;

    let mut tokens = Vec::new();
    for raw in &args.tokens {
        tokens.push(resolver.resolve(&args.node, raw, protocol)?);
    }

    if args.dry_run {
        print_dry_run(&args, &tokens);
        return Ok(());
    }

    let registry = Arc::new(LogRegistry::new(&log_root));
    let queue = CommandQueue::new(
        Box::new(TcpSessionFactory::new()),
        QueueLimits::default(),
    );

    // Progress events → log lines; a real UI would consume these instead.
    let (ev_tx, mut ev_rx) = mpsc::channel::<BatchEvent>(64);
    tokio::spawn(async move {
        while let Some(event) = ev_rx.recv().await {
            match event {
                BatchEvent::Progress { current, total } => {
                    info!(current, total, "batch progress");
                }
                BatchEvent::Status { text, duration_ms } => {
                    info!(%text, duration_ms, "batch status");
                }
                BatchEvent::Finished { success, total } => {
                    info!(success, total, "batch processing finished");
                }
            }
        }
    });

    let processor = Arc::new(
        SequentialBatchProcessor::new(queue.clone(), Arc::clone(&registry))
            .with_events(ev_tx),
    );

    // Ctrl-C → cooperative stop; the in-flight command finishes naturally.
    {
        let processor = Arc::clone(&processor);
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("stop requested; remaining tokens will be skipped");
            processor.stop_processing();
        });
    }

    let options = BatchOptions {
        command_timeout: Duration::from_secs(args.timeout_secs),
        reuse_session: args.reuse_session,
        ..BatchOptions::default()
    };

    let result = processor
        .process_batch(tokens, &args.command, options)
        .await?;

    queue.stop();
    registry.close_all();

    println!(
        "batch finished: {} ok, {} failed ({} timeouts), {} skipped of {}",
        result.success, result.failure, result.timeouts, result.skipped, result.total
    );
    if result.halted_by_circuit_breaker {
        println!("note: batch halted early by the circuit breaker");
    }

    debug!("run complete");
    Ok(())
}

/// Simple dry-run output: print resolved targets and rendered commands.
fn print_dry_run(args: &CliArgs, tokens: &[Token]) {
    println!("noderelay dry-run");
    println!("  node: {}", args.node);
    println!("  protocol: {}", args.protocol);
    println!("  timeout: {}s", args.timeout_secs);
    println!("  reuse_session: {}", args.reuse_session);
    println!();

    println!("tokens ({}):", tokens.len());
    for token in tokens {
        println!("  - {} ({})", token.id, token.kind);
        println!("      target: {}", token.address());
        if token.is_temporary() {
            println!("      (temporary token; would fail at dispatch)");
        }
        println!(
            "      cmd: {}",
            batch::processor::render_template(&args.command, token)
        );
    }

    debug!("dry-run complete (no execution)");
}
