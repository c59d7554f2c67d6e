// src/resolve/resolver.rs

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::errors::{RelayError, Result};
use crate::resolve::normalize::normalize_token_id;
use crate::types::{Node, NodeName, Protocol, Token, SENTINEL_IP};

/// Default wire transport for synthesized temporary tokens.
const TEMPORARY_TRANSPORT: &str = "telnet";

/// Registry of configured nodes plus the resolution algorithm.
///
/// Read-mostly: the node map is built once from the validated inventory and
/// only mutated by dynamic IP discovery, hence the `RwLock`.
#[derive(Debug)]
pub struct TokenResolver {
    nodes: RwLock<HashMap<NodeName, Node>>,
}

impl TokenResolver {
    /// Build the resolver from materialized inventory nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let map = nodes
            .into_iter()
            .map(|n| (n.name.clone(), n))
            .collect::<HashMap<_, _>>();
        Self {
            nodes: RwLock::new(map),
        }
    }

    /// Names of all configured nodes.
    pub fn node_names(&self) -> Vec<NodeName> {
        let nodes = self.nodes.read().expect("node registry lock poisoned");
        let mut names: Vec<_> = nodes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of a node's tokens (for batch construction and diagnostics).
    pub fn tokens_of(&self, node_name: &str) -> Result<Vec<Token>> {
        let nodes = self.nodes.read().expect("node registry lock poisoned");
        let node = nodes
            .get(node_name)
            .ok_or_else(|| RelayError::NodeNotFound(node_name.to_string()))?;
        Ok(node.tokens.clone())
    }

    /// Resolve `(node, raw id, desired protocol)` to a concrete token.
    ///
    /// Resolution never fails for an unknown *token*: the fallback chain is
    ///
    /// 1. exact match: stored type equals `desired`, normalized ids equal;
    /// 2. (RPC only) FBC fallback: an FBC entry with the same id exists, so
    ///    an RPC token is synthesized from it — the FBC entry is untouched;
    /// 3. temporary token with the sentinel address, logged as a warning.
    ///
    /// The only error is [`RelayError::NodeNotFound`] when the node itself
    /// is absent from the inventory.
    pub fn resolve(
        &self,
        node_name: &str,
        raw_id: &str,
        desired: Protocol,
    ) -> Result<Token> {
        let nodes = self.nodes.read().expect("node registry lock poisoned");
        let node = nodes
            .get(node_name)
            .ok_or_else(|| RelayError::NodeNotFound(node_name.to_string()))?;

        let wanted = normalize_token_id(raw_id, desired);

        // Step 1: exact match on (normalized id, type).
        if let Some(token) = node
            .tokens
            .iter()
            .find(|t| t.kind == desired && normalize_token_id(&t.id, desired) == wanted)
        {
            debug!(
                node = %node_name,
                token = %wanted,
                protocol = %desired,
                "resolved token by exact match"
            );
            return Ok(token.clone());
        }

        // Step 2: hybrid fallback, RPC requests only. There is no reverse
        // fallback: an FBC request never borrows an RPC entry.
        if desired == Protocol::Rpc {
            if let Some(fbc) = node
                .tokens
                .iter()
                .find(|t| {
                    t.kind == Protocol::Fbc
                        && normalize_token_id(&t.id, Protocol::Rpc) == wanted
                })
            {
                info!(
                    node = %node_name,
                    token = %wanted,
                    "no RPC entry; synthesizing RPC token from FBC sibling"
                );
                return Ok(Token {
                    id: fbc.id.clone(),
                    kind: Protocol::Rpc,
                    node: fbc.node.clone(),
                    ip: fbc.ip.clone(),
                    port: fbc.port,
                    transport: fbc.transport.clone(),
                });
            }
        }

        // Step 3: temporary token. Unusable for real execution, but the
        // caller always gets *something* back.
        warn!(
            node = %node_name,
            token = %wanted,
            protocol = %desired,
            "token not found; returning temporary token with sentinel address"
        );
        Ok(Token {
            id: wanted,
            kind: desired,
            node: node_name.to_string(),
            ip: SENTINEL_IP.to_string(),
            port: 0,
            transport: TEMPORARY_TRANSPORT.to_string(),
        })
    }

    /// Assign a discovered IP to a node and its address-less tokens.
    ///
    /// Returns how many tokens were updated. Tokens that already carry a
    /// real address are left untouched; so is the node's own address.
    pub(crate) fn assign_discovered_ip(&self, node_name: &str, ip: &str) -> usize {
        let mut nodes = self.nodes.write().expect("node registry lock poisoned");
        let Some(node) = nodes.get_mut(node_name) else {
            return 0;
        };

        if !node.has_address() {
            info!(node = %node_name, ip = %ip, "discovered address for node");
            node.ip = ip.to_string();
        }

        let mut updated = 0;
        for token in node.tokens.iter_mut() {
            if !token.has_address() {
                debug!(
                    node = %node_name,
                    token = %token.id,
                    ip = %ip,
                    "assigning discovered address to token"
                );
                token.ip = ip.to_string();
                updated += 1;
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        let token = |id: &str, kind: Protocol, port: u16| Token {
            id: id.to_string(),
            kind,
            node: "AP01m".to_string(),
            ip: "192.168.0.11".to_string(),
            port,
            transport: "telnet".to_string(),
        };
        Node {
            name: "AP01m".to_string(),
            ip: "192.168.0.11".to_string(),
            tokens: vec![
                token("162", Protocol::Fbc, 23),
                token("163", Protocol::Rpc, 23),
            ],
        }
    }

    fn resolver() -> TokenResolver {
        TokenResolver::from_nodes(vec![test_node()])
    }

    #[test]
    fn exact_match_wins() {
        let token = resolver()
            .resolve("AP01m", "163", Protocol::Rpc)
            .expect("node exists");
        assert_eq!(token.kind, Protocol::Rpc);
        assert_eq!(token.id, "163");
        assert!(!token.is_temporary());
    }

    #[test]
    fn fbc_lookup_pads_short_numeric_ids() {
        let resolver = TokenResolver::from_nodes(vec![Node {
            name: "AP02m".to_string(),
            ip: "10.0.0.1".to_string(),
            tokens: vec![Token {
                id: "007".to_string(),
                kind: Protocol::Fbc,
                node: "AP02m".to_string(),
                ip: "10.0.0.1".to_string(),
                port: 23,
                transport: "telnet".to_string(),
            }],
        }]);

        let token = resolver
            .resolve("AP02m", "7", Protocol::Fbc)
            .expect("node exists");
        assert_eq!(token.id, "007");
        assert!(!token.is_temporary());
    }

    #[test]
    fn rpc_request_synthesizes_from_fbc_sibling() {
        let token = resolver()
            .resolve("AP01m", "162", Protocol::Rpc)
            .expect("node exists");
        assert_eq!(token.kind, Protocol::Rpc);
        assert_eq!(token.id, "162");
        assert_eq!(token.ip, "192.168.0.11");
        assert_eq!(token.port, 23);
        assert!(!token.is_temporary());

        // The FBC entry itself is not mutated.
        let fbc = resolver()
            .resolve("AP01m", "162", Protocol::Fbc)
            .expect("node exists");
        assert_eq!(fbc.kind, Protocol::Fbc);
    }

    #[test]
    fn resolution_is_deterministic() {
        let r = resolver();
        let first = r.resolve("AP01m", "162", Protocol::Rpc).expect("resolves");
        let second = r.resolve("AP01m", "162", Protocol::Rpc).expect("resolves");
        assert_eq!(first, second);
    }

    #[test]
    fn fbc_request_never_borrows_rpc_entry() {
        // "163" exists only as RPC; an FBC request must fall through to the
        // temporary token, not synthesize from the RPC entry.
        let token = resolver()
            .resolve("AP01m", "163", Protocol::Fbc)
            .expect("node exists");
        assert!(token.is_temporary());
    }

    #[test]
    fn unknown_token_degrades_to_temporary() {
        let token = resolver()
            .resolve("AP01m", "999", Protocol::Rpc)
            .expect("node exists");
        assert!(token.is_temporary());
        assert_eq!(token.ip, SENTINEL_IP);
        assert_eq!(token.node, "AP01m");
    }

    #[test]
    fn unknown_node_is_an_error() {
        let result = resolver().resolve("missing", "162", Protocol::Fbc);
        assert!(matches!(result, Err(RelayError::NodeNotFound(_))));
    }
}
