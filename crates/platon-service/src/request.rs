// SPDX-License-Identifier: MIT OR Apache-2.0
//! RPC-facing request/response DTOs for the `Process*`, `TestPolicy`, and
//! `HealthCheck` operations.

use platon_handlers::{Policy, PolicyViolation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Input shared by `Process`, `ProcessPre`, and `ProcessPost`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessRequest {
    /// Caller-supplied request id; generated if absent or empty.
    #[serde(default)]
    pub id: Option<String>,
    /// Which pipeline this request targets.
    pub pipeline_id: String,
    /// The prompt text.
    #[serde(default)]
    pub prompt: String,
    /// The response text, if already known (used by `ProcessPost` callers
    /// that already have a main-processor response to run through the
    /// post-pass).
    #[serde(default)]
    pub response: Option<String>,
    /// Input side-channel metadata, copied into the context verbatim.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Input for `TestPolicy`: evaluate `policy` against `test_text` without
/// touching any live context or catalog.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestPolicyRequest {
    /// The policy to evaluate (need not be catalog-registered).
    pub policy: Policy,
    /// The text to evaluate the policy's rules against.
    pub test_text: String,
}

/// Output of `TestPolicy`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TestPolicyResult {
    /// The overall decision, derived per the block > modify > escalate >
    /// allow precedence.
    pub decision: platon_handlers::PolicyDecision,
    /// Every violation recorded during evaluation.
    pub violations: Vec<PolicyViolation>,
    /// The text after any `redact` rules have been applied.
    pub modified_text: String,
    /// Human-readable summary of why this decision was reached.
    pub reason: String,
    /// Wall-clock evaluation duration, in milliseconds.
    pub duration_ms: u64,
}

/// Output of `HealthCheck`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthStatus {
    /// `"ok"` once the service has completed construction.
    pub status: String,
    /// Service name, `"platon"`.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the service was constructed.
    pub uptime_seconds: u64,
    /// Free-form diagnostic details (handler count, catalog sizes, ...).
    pub details: Map<String, Value>,
}
