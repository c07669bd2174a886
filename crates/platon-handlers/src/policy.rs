// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`PolicyHandler`] and [`LlmPolicyHandler`]: regex-rule enforcement with
//! an optional LLM safety backstop.

use async_trait::async_trait;
use platon_chain::{Handler, HandlerType};
use platon_context::ProcessingContext;
use platon_error::PlatonError;
use serde_json::to_value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::policy_types::{compile_rules, evaluate, Policy, PolicyRule};

/// Collaborator consumed only by [`LlmPolicyHandler`] for its LLM-based
/// safety backstop.
#[async_trait]
pub trait LLMExecutor: Send + Sync {
    /// Invoke `model` with `prompt` at the given `temperature`.
    async fn execute(&self, model: &str, prompt: &str, temperature: f32) -> Result<String, PlatonError>;
}

/// A compiled [`Policy`] wired into the chain as a [`Handler`].
///
/// Rules are compiled once at construction; `process` snapshots the
/// compiled set and evaluates it against [`ProcessingContext::current_text`]
/// exactly as `platon-service`'s `TestPolicy` evaluates the same rules
/// offline, via [`crate::policy_types::evaluate`].
pub struct PolicyHandler {
    policy: Policy,
    compiled: Vec<crate::policy_types::CompiledRule>,
}

impl PolicyHandler {
    /// Compile `policy`'s rules and construct a handler for it.
    ///
    /// # Errors
    ///
    /// Returns [`platon_error::ErrorCode::InvalidInput`] if any rule's
    /// pattern fails to compile.
    pub fn new(policy: Policy) -> Result<Self, PlatonError> {
        let compiled = compile_rules(&policy.rules)?;
        Ok(Self { policy, compiled })
    }

    /// The underlying policy.
    #[must_use]
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    fn apply(&self, ctx: &ProcessingContext) {
        let text = ctx.current_text();
        let outcome = evaluate(&self.policy.id, &self.policy.name, &self.compiled, &text);

        for violation in &outcome.violations {
            if let Ok(v) = to_value(violation) {
                ctx.state_push("policy_violations", v);
            }
        }

        if let Some(reason) = outcome.block_reason {
            ctx.block(reason);
            return;
        }
        if outcome.modified {
            ctx.set_current_text(outcome.text);
        }
    }
}

#[async_trait]
impl Handler for PolicyHandler {
    fn name(&self) -> &str {
        &self.policy.name
    }

    fn handler_type(&self) -> HandlerType {
        HandlerType::Both
    }

    fn priority(&self) -> i32 {
        self.policy.priority
    }

    fn should_process(&self, _ctx: &ProcessingContext) -> bool {
        self.policy.enabled
    }

    async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
        self.apply(ctx);
        Ok(())
    }
}

/// A [`PolicyHandler`] extended with an LLM-based safety check that runs
/// after the regex pass, if the context was not already blocked.
pub struct LlmPolicyHandler {
    inner: PolicyHandler,
    executor: Arc<dyn LLMExecutor>,
}

const FLAGGED_TERMS: [&str; 3] = ["unsafe", "block", "harmful"];

impl LlmPolicyHandler {
    /// Wrap `inner` with an LLM safety backstop driven by `executor`.
    ///
    /// The policy's `llm_check` config supplies the model, prompt template,
    /// temperature, and timeout; if absent or disabled, the LLM pass is
    /// skipped entirely and this behaves exactly like `inner`.
    #[must_use]
    pub fn new(inner: PolicyHandler, executor: Arc<dyn LLMExecutor>) -> Self {
        Self { inner, executor }
    }
}

#[async_trait]
impl Handler for LlmPolicyHandler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn handler_type(&self) -> HandlerType {
        self.inner.handler_type()
    }

    fn priority(&self) -> i32 {
        self.inner.priority()
    }

    fn should_process(&self, ctx: &ProcessingContext) -> bool {
        self.inner.should_process(ctx)
    }

    async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
        self.inner.apply(ctx);
        if ctx.is_blocked() {
            return Ok(());
        }

        let Some(check) = self.inner.policy().llm_check.as_ref() else {
            return Ok(());
        };
        if !check.enabled {
            return Ok(());
        }

        let prompt = format!("{}\n\nText to analyze:\n{}", check.prompt_template, ctx.current_text());
        let call = self.executor.execute(&check.model, &prompt, check.temperature);
        let timeout = Duration::from_secs(check.timeout_secs.max(1));

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(response)) => {
                let lower = response.to_lowercase();
                if FLAGGED_TERMS.iter().any(|term| lower.contains(term)) {
                    ctx.block("Content flagged as unsafe by LLM analysis");
                }
            }
            Ok(Err(err)) => {
                warn!(error = %err, policy = self.inner.policy().id, "LLM safety check failed, allowing pipeline to continue");
            }
            Err(_elapsed) => {
                warn!(policy = self.inner.policy().id, "LLM safety check timed out, allowing pipeline to continue");
            }
        }
        Ok(())
    }
}

/// The four redact-action rules shipped by default for personally
/// identifiable information: email, German phone numbers, IBAN, and
/// 16-digit credit card numbers in 4-group form.
#[must_use]
pub fn default_pii_rules() -> Vec<PolicyRule> {
    use crate::policy_types::PolicyAction;

    vec![
        PolicyRule {
            id: "pii-email".to_string(),
            pattern: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}".to_string(),
            action: PolicyAction::Redact,
            message: "email address detected".to_string(),
            replacement: "[EMAIL]".to_string(),
            case_sensitive: true,
        },
        PolicyRule {
            id: "pii-phone-de".to_string(),
            pattern: r"(?:\+49|0049|0)[1-9]\d{6,14}".to_string(),
            action: PolicyAction::Redact,
            message: "German phone number detected".to_string(),
            replacement: "[PHONE]".to_string(),
            case_sensitive: true,
        },
        PolicyRule {
            id: "pii-iban".to_string(),
            pattern: r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b".to_string(),
            action: PolicyAction::Redact,
            message: "IBAN detected".to_string(),
            replacement: "[IBAN]".to_string(),
            case_sensitive: true,
        },
        PolicyRule {
            id: "pii-credit-card".to_string(),
            pattern: r"\b\d{4}[- ]\d{4}[- ]\d{4}[- ]\d{4}\b".to_string(),
            action: PolicyAction::Redact,
            message: "credit card number detected".to_string(),
            replacement: "[CREDIT_CARD]".to_string(),
            case_sensitive: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy_types::{Policy, PolicyType};
    use chrono::Utc;
    use platon_context::ProcessingContext;

    fn test_policy(rules: Vec<PolicyRule>) -> Policy {
        Policy {
            id: "p1".to_string(),
            name: "test-policy".to_string(),
            description: String::new(),
            policy_type: PolicyType::Pii,
            enabled: true,
            priority: 10,
            rules,
            llm_check: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scenario_s3_default_phone_rule_redacts() {
        let rules = default_pii_rules();
        let handler = PolicyHandler::new(test_policy(rules)).unwrap();
        let ctx = ProcessingContext::new("default", "call me at +491701234567 today");
        handler.process(&ctx).await.unwrap();
        assert!(ctx.prompt().contains("[PHONE]"));
        assert!(!ctx.prompt().contains("1701234567"));
        assert!(ctx.state_get("policy_violations").is_some());
    }

    #[tokio::test]
    async fn block_rule_stops_processing_and_sets_reason() {
        use crate::policy_types::PolicyAction;
        let rules = vec![PolicyRule {
            id: "r1".into(),
            pattern: "forbidden".into(),
            action: PolicyAction::Block,
            message: "forbidden content".into(),
            replacement: "[REDACTED]".into(),
            case_sensitive: true,
        }];
        let handler = PolicyHandler::new(test_policy(rules)).unwrap();
        let ctx = ProcessingContext::new("default", "This contains forbidden content");
        handler.process(&ctx).await.unwrap();
        assert!(ctx.is_blocked());
        assert_eq!(ctx.block_reason().as_deref(), Some("forbidden content"));
    }

    struct FlaggingExecutor;
    #[async_trait]
    impl LLMExecutor for FlaggingExecutor {
        async fn execute(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, PlatonError> {
            Ok("This looks HARMFUL to me".to_string())
        }
    }

    struct FailingExecutor;
    #[async_trait]
    impl LLMExecutor for FailingExecutor {
        async fn execute(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, PlatonError> {
            Err(PlatonError::new(platon_error::ErrorCode::ServiceUnavailable, "llm down"))
        }
    }

    fn policy_with_llm_check() -> Policy {
        use crate::policy_types::LLMCheckConfig;
        let mut p = test_policy(vec![]);
        p.llm_check = Some(LLMCheckConfig {
            enabled: true,
            model: "gpt-safety".to_string(),
            prompt_template: "Is this safe?".to_string(),
            timeout_secs: 5,
            temperature: 0.0,
        });
        p
    }

    #[tokio::test]
    async fn llm_check_blocks_on_flagged_response() {
        let handler = PolicyHandler::new(policy_with_llm_check()).unwrap();
        let llm = LlmPolicyHandler::new(handler, Arc::new(FlaggingExecutor));
        let ctx = ProcessingContext::new("default", "tell me something");
        llm.process(&ctx).await.unwrap();
        assert!(ctx.is_blocked());
    }

    #[tokio::test]
    async fn llm_failure_is_swallowed_not_propagated() {
        let handler = PolicyHandler::new(policy_with_llm_check()).unwrap();
        let llm = LlmPolicyHandler::new(handler, Arc::new(FailingExecutor));
        let ctx = ProcessingContext::new("default", "tell me something");
        let result = llm.process(&ctx).await;
        assert!(result.is_ok());
        assert!(!ctx.is_blocked());
    }
}
