// src/resolve/mod.rs

//! Token resolution.
//!
//! Maps `(node name, raw token id, desired protocol)` to a concrete
//! [`Token`](crate::types::Token):
//! - per-protocol id normalization ([`normalize`])
//! - hybrid RPC→FBC fallback with synthesis and a temporary-token fallback
//!   that never fails the caller ([`resolver`])
//! - opportunistic IP repair from observed log artifacts ([`discovery`])

pub mod discovery;
pub mod normalize;
pub mod resolver;

pub use discovery::scan_for_dynamic_ips;
pub use normalize::normalize_token_id;
pub use resolver::TokenResolver;
