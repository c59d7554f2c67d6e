// src/config/model.rs

//! Serde models for the node inventory file.

use serde::Deserialize;

use crate::types::{Node, NodeName, Protocol, Token};

/// Default wire transport when a token record omits `protocol`.
pub const DEFAULT_TRANSPORT: &str = "telnet";

/// One token entry of a node record, as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRecord {
    pub token_id: String,
    pub token_type: Protocol,
    pub port: u16,
    /// Wire transport (e.g. "telnet"); defaults to [`DEFAULT_TRANSPORT`].
    #[serde(default)]
    pub protocol: Option<String>,
}

/// One node record, as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeRecord {
    pub name: NodeName,
    /// May be absent; dynamic IP discovery can fill it in later.
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}

/// Deserialized but not yet validated inventory.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RawInventory {
    pub nodes: Vec<NodeRecord>,
}

/// Validated node inventory.
///
/// Construct via `Inventory::try_from(raw)`; see `config::validate`.
#[derive(Debug, Clone)]
pub struct Inventory {
    nodes: Vec<NodeRecord>,
}

impl Inventory {
    /// Used by validation after all checks pass.
    pub(crate) fn new_unchecked(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.nodes
    }

    /// Materialize the runtime [`Node`]/[`Token`] model from the records.
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
            .into_iter()
            .map(|rec| {
                let ip = rec.ip_address.unwrap_or_default();
                let tokens = rec
                    .tokens
                    .into_iter()
                    .map(|t| Token {
                        id: t.token_id,
                        kind: t.token_type,
                        node: rec.name.clone(),
                        // Tokens inherit the node address; discovery repairs
                        // unset ones later.
                        ip: ip.clone(),
                        port: t.port,
                        transport: t
                            .protocol
                            .unwrap_or_else(|| DEFAULT_TRANSPORT.to_string()),
                    })
                    .collect();

                Node {
                    name: rec.name,
                    ip,
                    tokens,
                }
            })
            .collect()
    }
}
