// src/cli.rs

//! Command-line argument parsing for `noderelay`.

use clap::{Parser, ValueEnum};

/// Log level accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Dispatch a command against one or more tokens of a configured node.
#[derive(Debug, Parser)]
#[command(name = "noderelay", version, about)]
pub struct CliArgs {
    /// Path to the node inventory (JSON array of node records).
    #[arg(long, default_value = "nodes.json")]
    pub nodes: String,

    /// Root directory for per-token log files.
    #[arg(long, default_value = "logs")]
    pub log_root: String,

    /// Node to run against.
    #[arg(long)]
    pub node: String,

    /// Token ids to run against, in order.
    #[arg(long = "token", required = true)]
    pub tokens: Vec<String>,

    /// Desired protocol (FBC or RPC).
    #[arg(long, default_value = "FBC")]
    pub protocol: String,

    /// Command template; `{id}`, `{node}` and `{ip}` are substituted per token.
    pub command: String,

    /// Per-command timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Keep the session connected between tokens of the batch.
    #[arg(long)]
    pub reuse_session: bool,

    /// Print what would run without connecting anywhere.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (overrides NODERELAY_LOG).
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}
