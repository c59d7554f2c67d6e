// src/resolve/normalize.rs

//! Per-protocol token id normalization, applied before every lookup and
//! when building log filenames and composite keys.

use crate::types::Protocol;

/// Normalize a raw token id for the given protocol.
///
/// - `Fbc`: purely numeric ids are zero-padded to 3 digits ("7" → "007");
///   anything else is upper-cased.
/// - `Rpc`: lower-cased with non-alphanumeric characters stripped.
pub fn normalize_token_id(raw: &str, protocol: Protocol) -> String {
    let trimmed = raw.trim();
    match protocol {
        Protocol::Fbc => {
            if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
                format!("{trimmed:0>3}")
            } else {
                trimmed.to_uppercase()
            }
        }
        Protocol::Rpc => trimmed
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase(),
    }
}
