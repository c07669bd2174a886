// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frozen snapshot of a completed chain pass.

use platon_context::{AuditEntry, ProcessingContext};
use schemars::JsonSchema;
use serde_json::Map;
use serde_json::Value;

/// Immutable snapshot of a [`ProcessingContext`] taken once a pass (or the
/// full pre/main/post orchestration) has completed.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, JsonSchema)]
pub struct ProcessResult {
    /// The context's request id.
    pub request_id: String,
    /// The prompt text as it stood when the snapshot was taken.
    pub processed_prompt: String,
    /// The response text as it stood when the snapshot was taken, if any.
    pub processed_response: Option<String>,
    /// Whether the context was blocked.
    pub blocked: bool,
    /// The block reason, if blocked.
    pub block_reason: Option<String>,
    /// Whether any handler modified the context's text.
    pub modified: bool,
    /// The full audit log in execution order.
    pub audit_log: Vec<AuditEntry>,
    /// The context's metadata map.
    pub metadata: Map<String, Value>,
    /// Total wall-clock duration since context construction, in milliseconds.
    pub total_duration_ms: u64,
}

impl ProcessResult {
    /// Freeze a snapshot of `ctx`.
    #[must_use]
    pub fn freeze(ctx: &ProcessingContext) -> Self {
        Self {
            request_id: ctx.request_id().to_string(),
            processed_prompt: ctx.prompt(),
            processed_response: ctx.response(),
            blocked: ctx.is_blocked(),
            block_reason: ctx.block_reason(),
            modified: ctx.is_modified(),
            audit_log: ctx.audit_log(),
            metadata: ctx.metadata_snapshot(),
            total_duration_ms: ctx.elapsed().as_millis() as u64,
        }
    }
}
