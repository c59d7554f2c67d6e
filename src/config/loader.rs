// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Inventory, RawInventory};
use crate::errors::Result;

/// Load the node inventory from a given path and return the raw records.
///
/// This only performs JSON deserialization; it does **not** perform semantic
/// validation (duplicate nodes, duplicate token ids, etc.). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawInventory> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawInventory = serde_json::from_str(&contents)?;

    Ok(raw)
}

/// Load the node inventory from path and run basic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads JSON.
/// - Checks for:
///   - an empty inventory,
///   - duplicate node names,
///   - duplicate `(token_id, token_type)` pairs within a node,
///   - zero ports.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Inventory> {
    let raw = load_from_path(&path)?;
    let inventory = Inventory::try_from(raw)?;
    Ok(inventory)
}

/// Helper to resolve a default inventory path.
///
/// Currently this just returns `nodes.json` in the current working
/// directory, but this function exists so you can later:
///
/// - Respect an env var (e.g. `NODERELAY_NODES`).
/// - Look for multiple default locations.
pub fn default_nodes_path() -> PathBuf {
    PathBuf::from("nodes.json")
}
