// SPDX-License-Identifier: MIT OR Apache-2.0
//! Policy data model: [`Policy`], [`PolicyRule`], [`PolicyViolation`], and
//! [`LLMCheckConfig`], plus the shared regex-evaluation routine used by both
//! [`crate::PolicyHandler`] and `platon-service`'s `TestPolicy` operation.

use chrono::{DateTime, Utc};
use platon_error::{ErrorCode, PlatonError};
use regex::{Regex, RegexBuilder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What a matched [`PolicyRule`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    /// Block the request/response outright.
    Block,
    /// Explicitly allow; recorded but has no side effect.
    Allow,
    /// Replace matches with the rule's replacement text.
    Redact,
    /// Record a violation but do not alter the text.
    Warn,
    /// Record a violation at the lowest severity; informational only.
    Log,
}

/// Severity derived from the [`PolicyAction`] that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Lowest severity, used for `allow` matches.
    Info,
    /// `log` action.
    Low,
    /// `warn` action.
    Medium,
    /// `redact` action.
    High,
    /// `block` action.
    Critical,
}

impl PolicyAction {
    /// Severity implied by this action, per the component spec's
    /// `block→critical, redact→high, warn→medium, log→low, other→info`
    /// table.
    #[must_use]
    pub fn severity(self) -> ViolationSeverity {
        match self {
            Self::Block => ViolationSeverity::Critical,
            Self::Redact => ViolationSeverity::High,
            Self::Warn => ViolationSeverity::Medium,
            Self::Log => ViolationSeverity::Low,
            Self::Allow => ViolationSeverity::Info,
        }
    }
}

/// Broad category a [`Policy`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// General content rules.
    Content,
    /// Safety rules, typically paired with an [`LLMCheckConfig`].
    Safety,
    /// Scope/topic restriction rules.
    Scope,
    /// Personally-identifiable-information redaction rules.
    Pii,
    /// Anything not covered by the above.
    Custom,
}

/// A single regex rule within a [`Policy`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyRule {
    /// Unique id within the owning policy.
    pub id: String,
    /// The regex pattern matched against the current text.
    pub pattern: String,
    /// What to do with each match.
    pub action: PolicyAction,
    /// Human-readable explanation surfaced in violations / block reasons.
    pub message: String,
    /// Replacement text for `redact` matches. Defaults to `[REDACTED]`.
    #[serde(default = "default_replacement")]
    pub replacement: String,
    /// Whether the pattern is matched case-sensitively.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_replacement() -> String {
    "[REDACTED]".to_string()
}

fn default_case_sensitive() -> bool {
    true
}

/// Configuration for the optional LLM-based safety check a
/// [`crate::LlmPolicyHandler`] runs after its regex pass.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LLMCheckConfig {
    /// Whether the LLM check is active.
    pub enabled: bool,
    /// Model identifier passed to the `LLMExecutor`.
    pub model: String,
    /// Prompt template prepended to the text under analysis.
    pub prompt_template: String,
    /// Timeout, in seconds, for the executor call.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature passed to the executor.
    #[serde(default)]
    pub temperature: f32,
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// A policy: an ordered set of [`PolicyRule`]s plus optional LLM backstop.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    /// Unique id within the policy catalog.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Category.
    #[serde(rename = "type")]
    pub policy_type: PolicyType,
    /// Whether this policy is active.
    pub enabled: bool,
    /// Dispatch priority, passed through to the generated handler.
    pub priority: i32,
    /// The rules evaluated against the current text, in order.
    pub rules: Vec<PolicyRule>,
    /// Optional LLM safety backstop.
    #[serde(default)]
    pub llm_check: Option<LLMCheckConfig>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A single rule match recorded during evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyViolation {
    /// Id of the policy that produced this violation.
    pub policy_id: String,
    /// Name of the policy that produced this violation.
    pub policy_name: String,
    /// Id of the specific rule that matched.
    pub rule_id: String,
    /// Severity derived from the rule's action.
    pub severity: ViolationSeverity,
    /// The rule's human-readable message.
    pub description: String,
    /// The exact substring that matched.
    pub matched: String,
    /// Byte offset of the match within the evaluated text.
    pub location: usize,
    /// The action the rule specified.
    pub action: PolicyAction,
}

/// A [`PolicyRule`] with its pattern already compiled.
pub struct CompiledRule {
    /// The rule this compiled regex was built from.
    pub rule: PolicyRule,
    /// The compiled pattern.
    pub regex: Regex,
}

/// Compile every rule in `rules`, returning [`ErrorCode::InvalidInput`] with
/// the offending `rule_id` in `details` on the first bad pattern.
pub fn compile_rules(rules: &[PolicyRule]) -> Result<Vec<CompiledRule>, PlatonError> {
    rules
        .iter()
        .map(|rule| {
            RegexBuilder::new(&rule.pattern)
                .case_insensitive(!rule.case_sensitive)
                .build()
                .map(|regex| CompiledRule { rule: rule.clone(), regex })
                .map_err(|e| {
                    PlatonError::new(ErrorCode::InvalidInput, format!("invalid policy rule pattern: {e}"))
                        .with_detail("rule_id", &rule.id)
                })
        })
        .collect()
}

/// Outcome of running [`evaluate`] against one piece of text.
pub struct EvaluationOutcome {
    /// Violations recorded, in rule order.
    pub violations: Vec<PolicyViolation>,
    /// The text after any `redact` rules have been applied.
    pub text: String,
    /// Set to the blocking rule's message the moment a `block` rule
    /// matches; evaluation stops at that point.
    pub block_reason: Option<String>,
    /// Whether `text` differs from the input (i.e. a `redact` rule fired).
    pub modified: bool,
}

/// Evaluate `compiled` rules against `text`, in order.
///
/// For each rule: every match is recorded as a [`PolicyViolation`]. A
/// `block` match stops evaluation immediately (no further rules run).
/// `redact` matches are replaced in the working text. `warn`/`log`/`allow`
/// matches are recorded without altering the text.
#[must_use]
pub fn evaluate(policy_id: &str, policy_name: &str, compiled: &[CompiledRule], text: &str) -> EvaluationOutcome {
    let mut working = text.to_string();
    let mut violations = Vec::new();
    let mut modified = false;

    for compiled_rule in compiled {
        let rule = &compiled_rule.rule;
        let matches: Vec<_> = compiled_rule.regex.find_iter(&working).map(|m| (m.start(), m.as_str().to_string())).collect();
        if matches.is_empty() {
            continue;
        }

        for (location, matched) in &matches {
            violations.push(PolicyViolation {
                policy_id: policy_id.to_string(),
                policy_name: policy_name.to_string(),
                rule_id: rule.id.clone(),
                severity: rule.action.severity(),
                description: rule.message.clone(),
                matched: matched.clone(),
                location: *location,
                action: rule.action,
            });
        }

        match rule.action {
            PolicyAction::Block => {
                return EvaluationOutcome {
                    violations,
                    text: working,
                    block_reason: Some(rule.message.clone()),
                    modified,
                };
            }
            PolicyAction::Redact => {
                working = compiled_rule.regex.replace_all(&working, rule.replacement.as_str()).into_owned();
                modified = true;
            }
            PolicyAction::Warn | PolicyAction::Log | PolicyAction::Allow => {}
        }
    }

    EvaluationOutcome {
        violations,
        text: working,
        block_reason: None,
        modified,
    }
}

/// Overall decision a [`crate::policy_types::evaluate`] pass maps to, per
/// the `block > modify > escalate > allow` precedence (invariant 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    /// No rule fired, or only `allow` rules matched.
    Allow,
    /// At least one `block` rule matched.
    Block,
    /// No block, but at least one `redact` rule matched.
    Modify,
    /// No block/redact, but at least one `warn` rule matched.
    Escalate,
}

/// Derive the overall [`PolicyDecision`] from an [`EvaluationOutcome`].
#[must_use]
pub fn decide(outcome: &EvaluationOutcome) -> PolicyDecision {
    if outcome.block_reason.is_some() {
        return PolicyDecision::Block;
    }
    if outcome.modified {
        return PolicyDecision::Modify;
    }
    if outcome
        .violations
        .iter()
        .any(|v| v.action == PolicyAction::Warn)
    {
        return PolicyDecision::Escalate;
    }
    PolicyDecision::Allow
}
