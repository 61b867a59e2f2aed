// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for canonicalization and digest stability.

use proptest::prelude::*;
use serde_json::Value;
use tg_core::{canonical_json, canonical_size, payload_digest};

/// Arbitrary JSON trees, bounded in depth and width.
fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 _.-]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,8}", inner, 0..6).prop_map(|m| {
                Value::Object(m.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    #[test]
    fn digest_is_deterministic(value in arb_value()) {
        prop_assert_eq!(payload_digest(&value).unwrap(), payload_digest(&value).unwrap());
    }

    #[test]
    fn digest_is_hex_sha256(value in arb_value()) {
        let digest = payload_digest(&value).unwrap();
        prop_assert_eq!(digest.len(), 64);
        prop_assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn canonical_size_matches_serialized_length(value in arb_value()) {
        prop_assert_eq!(canonical_size(&value).unwrap(), canonical_json(&value).unwrap().len());
    }

    #[test]
    fn canonical_form_roundtrips(value in arb_value()) {
        let canonical = canonical_json(&value).unwrap();
        let back: Value = serde_json::from_str(&canonical).unwrap();
        prop_assert_eq!(canonical_json(&back).unwrap(), canonical);
    }
}
