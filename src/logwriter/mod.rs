// src/logwriter/mod.rs

//! Per-token result logging.
//!
//! One open handle per `(normalized token id, lowercase protocol)`
//! composite key. The composite key matters: the same numeric id can
//! legitimately exist as both an FBC and an RPC token on one node, and
//! keying by id alone would silently alias the second open onto the first
//! handle, corrupting one protocol's log with the other's data.
//!
//! Layout produced under the log root:
//! - `{root}/FBC/{node}/{node}_{ip}_{id}.fbc`
//! - `{root}/RPC/{node}/{node}_{ip}_{id}.rpc`
//! - `{root}/{node}/{node}_{timestamp}_LOG.log` (batch-level log)
//!
//! IPs are embedded hyphen-delimited, which is also what dynamic IP
//! discovery reads back out of the tree.

pub mod naming;
pub mod registry;

pub use naming::{batch_log_path, parse_log_filename, token_log_path, ParsedLogName};
pub use registry::{BatchLog, LogRegistry};
