// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical node name type used throughout the crate.
pub type NodeName = String;

/// Sentinel address carried by temporary (unresolved) tokens.
pub const SENTINEL_IP: &str = "0.0.0.0";

/// Protocol family of a token.
///
/// - `Fbc`: fieldbus-command tokens, typically 3-digit numeric ids.
/// - `Rpc`: remote-procedure-call tokens on the same wire transport.
///
/// This doubles as the token *type*: the same numeric id may exist under
/// both families on one node, which is why log handles are keyed by
/// `(id, protocol)` and never by id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Fbc,
    Rpc,
}

impl Protocol {
    /// Uppercase directory name used in the log tree (`{root}/FBC/...`).
    pub fn dir_name(&self) -> &'static str {
        match self {
            Protocol::Fbc => "FBC",
            Protocol::Rpc => "RPC",
        }
    }

    /// Lowercase form used in log filename extensions and composite keys.
    pub fn lowercase(&self) -> &'static str {
        match self {
            Protocol::Fbc => "fbc",
            Protocol::Rpc => "rpc",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fbc" => Ok(Protocol::Fbc),
            "rpc" => Ok(Protocol::Rpc),
            other => Err(format!(
                "invalid protocol: {other} (expected \"FBC\" or \"RPC\")"
            )),
        }
    }
}

/// A resolved command target within a node.
///
/// Immutable once resolved; identity is `(node, id, kind)`. A token whose
/// `ip` is the sentinel is a *temporary* token: resolution produced it as a
/// fallback and it cannot be used for real command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Raw configured id (pre-normalization).
    pub id: String,
    pub kind: Protocol,
    pub node: NodeName,
    pub ip: String,
    pub port: u16,
    /// Wire transport name from configuration (e.g. "telnet").
    pub transport: String,
}

impl Token {
    /// Whether this token carries a usable address.
    pub fn has_address(&self) -> bool {
        !self.ip.is_empty() && self.ip != SENTINEL_IP
    }

    /// Whether this token was synthesized as a temporary fallback.
    pub fn is_temporary(&self) -> bool {
        self.ip == SENTINEL_IP
    }

    /// `ip:port` pair for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// A configured network node and its tokens.
///
/// Built once from the node inventory; read-mostly afterwards. The only
/// mutation path is dynamic IP discovery, which fills in unset addresses.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: NodeName,
    pub ip: String,
    /// Configured tokens. Raw ids are only unique per `(id, kind)` — the
    /// same numeric id can exist as both an FBC and an RPC token — so this
    /// is a list, not a map keyed by id alone.
    pub tokens: Vec<Token>,
}

impl Node {
    /// Whether the node itself has a known address.
    pub fn has_address(&self) -> bool {
        !self.ip.is_empty() && self.ip != SENTINEL_IP
    }
}
