// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property: error-chain depth never exceeds the wrap-depth cap, and
//! wrapping past the cap yields a truncation marker with severity=high
//! (invariant 8).

use platon_error::{ErrorCode, PlatonError, Severity};
use proptest::prelude::*;

proptest! {
    #[test]
    fn depth_never_exceeds_cap(wrap_count in 0usize..40) {
        let mut err = PlatonError::new(ErrorCode::Internal, "root cause");
        for i in 0..wrap_count {
            err = PlatonError::wrap(ErrorCode::Internal, format!("layer {i}"), err);
        }
        prop_assert!(err.depth() <= 15);
        if err.trace.len() == 15 && wrap_count > 15 {
            prop_assert!(err.severity >= Severity::High);
            prop_assert!(err.source.is_none());
        }
    }
}
