// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{Inventory, RawInventory};
use crate::errors::{RelayError, Result};

impl TryFrom<RawInventory> for Inventory {
    type Error = RelayError;

    fn try_from(raw: RawInventory) -> std::result::Result<Self, Self::Error> {
        validate_raw_inventory(&raw)?;
        Ok(Inventory::new_unchecked(raw.nodes))
    }
}

fn validate_raw_inventory(raw: &RawInventory) -> Result<()> {
    ensure_has_nodes(raw)?;
    validate_node_names(raw)?;
    validate_tokens(raw)?;
    Ok(())
}

fn ensure_has_nodes(raw: &RawInventory) -> Result<()> {
    if raw.nodes.is_empty() {
        return Err(RelayError::ConfigError(
            "inventory must contain at least one node record".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_names(raw: &RawInventory) -> Result<()> {
    let mut seen = HashSet::new();
    for rec in raw.nodes.iter() {
        if rec.name.trim().is_empty() {
            return Err(RelayError::ConfigError(
                "node record with empty name".to_string(),
            ));
        }
        if !seen.insert(rec.name.as_str()) {
            return Err(RelayError::ConfigError(format!(
                "duplicate node name '{}' in inventory",
                rec.name
            )));
        }
    }
    Ok(())
}

fn validate_tokens(raw: &RawInventory) -> Result<()> {
    for rec in raw.nodes.iter() {
        // `(id, type)` must be unique per node; the raw id alone is NOT
        // unique — the same numeric id can legitimately exist as both an
        // FBC and an RPC token.
        let mut seen = HashSet::new();

        for token in rec.tokens.iter() {
            if token.token_id.trim().is_empty() {
                return Err(RelayError::ConfigError(format!(
                    "node '{}' has a token with an empty id",
                    rec.name
                )));
            }
            if token.port == 0 {
                return Err(RelayError::ConfigError(format!(
                    "node '{}' token '{}' has port 0",
                    rec.name, token.token_id
                )));
            }
            if !seen.insert((token.token_id.as_str(), token.token_type)) {
                return Err(RelayError::ConfigError(format!(
                    "node '{}' has duplicate token ({}, {})",
                    rec.name, token.token_id, token.token_type
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawInventory {
        serde_json::from_str(json).expect("test inventory should deserialize")
    }

    #[test]
    fn accepts_duplicate_id_across_protocols() {
        let inventory = Inventory::try_from(raw(
            r#"[{
                "name": "AP01m",
                "ip_address": "192.168.0.11",
                "tokens": [
                    {"token_id": "162", "token_type": "FBC", "port": 23},
                    {"token_id": "162", "token_type": "RPC", "port": 23}
                ]
            }]"#,
        ));
        assert!(inventory.is_ok());
    }

    #[test]
    fn rejects_duplicate_id_within_protocol() {
        let result = Inventory::try_from(raw(
            r#"[{
                "name": "AP01m",
                "tokens": [
                    {"token_id": "162", "token_type": "FBC", "port": 23},
                    {"token_id": "162", "token_type": "FBC", "port": 24}
                ]
            }]"#,
        ));
        match result {
            Err(RelayError::ConfigError(msg)) => {
                assert!(msg.contains("duplicate token"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_empty_inventory() {
        assert!(Inventory::try_from(raw("[]")).is_err());
    }

    #[test]
    fn rejects_zero_port() {
        let result = Inventory::try_from(raw(
            r#"[{
                "name": "AP01m",
                "tokens": [{"token_id": "162", "token_type": "FBC", "port": 0}]
            }]"#,
        ));
        assert!(result.is_err());
    }
}
