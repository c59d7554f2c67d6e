// src/config/mod.rs

//! Node inventory loading and validation.
//!
//! The inventory is a JSON array of node records (`nodes.json` in a typical
//! deployment). Loading is split the usual way:
//! - [`loader`] reads and deserializes the file,
//! - [`validate`] turns the raw records into a validated [`Inventory`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_nodes_path, load_and_validate, load_from_path};
pub use model::{Inventory, NodeRecord, RawInventory, TokenRecord};
