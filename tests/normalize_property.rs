// tests/normalize_property.rs

use proptest::prelude::*;

use noderelay::resolve::normalize_token_id;
use noderelay::types::Protocol;

proptest! {
    // Printable ASCII covers everything the inventory format accepts.
    #[test]
    fn normalization_is_idempotent(raw in "[ -~]{0,16}") {
        for proto in [Protocol::Fbc, Protocol::Rpc] {
            let once = normalize_token_id(&raw, proto);
            prop_assert_eq!(normalize_token_id(&once, proto), once);
        }
    }

    #[test]
    fn rpc_output_is_lowercase_alphanumeric(raw in "[ -~]{0,16}") {
        let normalized = normalize_token_id(&raw, Protocol::Rpc);
        prop_assert!(normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn fbc_numeric_ids_keep_their_value_and_gain_width(raw in "[0-9]{1,6}") {
        let normalized = normalize_token_id(&raw, Protocol::Fbc);
        prop_assert!(normalized.len() >= 3);
        prop_assert_eq!(
            normalized.trim_start_matches('0').parse::<u64>().unwrap_or(0),
            raw.trim_start_matches('0').parse::<u64>().unwrap_or(0)
        );
    }

    #[test]
    fn equal_ids_stay_equal_under_whitespace(raw in "[0-9A-Za-z]{1,8}") {
        let padded = format!("  {raw} ");
        for proto in [Protocol::Fbc, Protocol::Rpc] {
            prop_assert_eq!(
                normalize_token_id(&padded, proto),
                normalize_token_id(&raw, proto)
            );
        }
    }
}
