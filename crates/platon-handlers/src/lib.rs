// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in [`platon_chain::Handler`] implementations: the dynamic
//! ordering slot, regex policy enforcement with an optional LLM safety
//! backstop, default PII redaction rules, and the terminal audit logger.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod audit_handler;
mod base;
mod dynamic;
mod policy;
mod policy_types;

pub use audit_handler::{AuditHandler, AUDIT_HANDLER_PRIORITY};
pub use base::BaseHandler;
pub use dynamic::DynamicHandler;
pub use policy::{default_pii_rules, LLMExecutor, LlmPolicyHandler, PolicyHandler};
pub use policy_types::{
    compile_rules, decide, evaluate, CompiledRule, EvaluationOutcome, LLMCheckConfig, Policy, PolicyAction,
    PolicyDecision, PolicyRule, PolicyType, PolicyViolation, ViolationSeverity,
};
