// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property: `fork()` yields independent state/metadata maps (invariant 7).

use platon_context::ProcessingContext;
use proptest::prelude::*;
use serde_json::Value;

proptest! {
    #[test]
    fn fork_state_mutations_never_cross(
        key in "[a-z]{1,8}",
        original_value in 0i64..1000,
        fork_value in 0i64..1000,
    ) {
        let ctx = ProcessingContext::new("default", "prompt");
        ctx.state_set(&key, Value::from(original_value));

        let fork = ctx.fork();
        fork.state_set(&key, Value::from(fork_value));

        prop_assert_eq!(ctx.state_get(&key), Some(Value::from(original_value)));
        prop_assert_eq!(fork.state_get(&key), Some(Value::from(fork_value)));
    }

    #[test]
    fn fork_metadata_mutations_never_cross(
        key in "[a-z]{1,8}",
        original_value in "[a-z]{0,16}",
        fork_value in "[a-z]{0,16}",
    ) {
        let ctx = ProcessingContext::new("default", "prompt");
        ctx.metadata_set(&key, Value::from(original_value.clone()));

        let fork = ctx.fork();
        fork.metadata_set(&key, Value::from(fork_value.clone()));

        prop_assert_eq!(ctx.metadata_get(&key), Some(Value::from(original_value)));
        prop_assert_eq!(fork.metadata_get(&key), Some(Value::from(fork_value)));
    }
}
