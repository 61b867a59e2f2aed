// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for chain integrity under arbitrary receipt sequences.

use proptest::prelude::*;
use tg_receipt::{Decision, ReceiptBuilder, ReceiptChain, Stage};

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Ingress),
        Just(Stage::Decision),
        Just(Stage::Gate),
        Just(Stage::Handler),
        Just(Stage::OutputPolicy),
        Just(Stage::Egress),
    ]
}

fn arb_decision() -> impl Strategy<Value = Decision> {
    prop_oneof![Just(Decision::Allow), Just(Decision::Deny), Just(Decision::Transform)]
}

proptest! {
    #[test]
    fn appended_chains_always_validate(
        entries in prop::collection::vec((arb_stage(), arb_decision(), "[a-z:]{3,24}"), 1..40)
    ) {
        let chain = ReceiptChain::new();
        for (stage, decision, action) in entries {
            chain.append(ReceiptBuilder::new(stage, action, decision).build()).unwrap();
        }
        let report = chain.validate();
        prop_assert!(report.is_valid());
        prop_assert_eq!(report.checked, chain.len());
    }

    #[test]
    fn sequences_are_consecutive_and_linked(
        n in 2usize..30
    ) {
        let chain = ReceiptChain::new();
        let mut appended = Vec::new();
        for _ in 0..n {
            let r = chain
                .append(ReceiptBuilder::new(Stage::Decision, "action:job:run", Decision::Allow).build())
                .unwrap();
            appended.push(r);
        }
        for (i, pair) in appended.windows(2).enumerate() {
            prop_assert_eq!(pair[0].sequence + 1, pair[1].sequence);
            prop_assert_eq!(
                pair[1].previous_hash.clone(),
                pair[0].self_hash.clone().unwrap(),
                "link break at {}", i
            );
        }
    }
}
