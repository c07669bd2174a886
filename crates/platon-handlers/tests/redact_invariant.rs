// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property: for redact-only policies, the post-redact text never contains
//! a substring matching any of the policy's rule patterns (invariant 5).

use platon_handlers::{compile_rules, evaluate, PolicyAction, PolicyRule};
use proptest::prelude::*;

fn digits_rule() -> PolicyRule {
    PolicyRule {
        id: "digits".to_string(),
        pattern: r"\d{3,}".to_string(),
        action: PolicyAction::Redact,
        message: "digit run detected".to_string(),
        replacement: "[NUM]".to_string(),
        case_sensitive: true,
    }
}

proptest! {
    #[test]
    fn redacted_text_never_contains_rule_pattern_match(
        text in "[a-zA-Z0-9 ]{0,80}"
    ) {
        let rule = digits_rule();
        let compiled = compile_rules(std::slice::from_ref(&rule)).unwrap();
        let outcome = evaluate("p", "redact-only", &compiled, &text);

        let leftover_regex = regex::Regex::new(&rule.pattern).unwrap();
        prop_assert!(!leftover_regex.is_match(&outcome.text));
    }
}
