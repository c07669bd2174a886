// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-request [`ProcessingContext`] shared between handlers in one
//! chain pass.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::AuditEntry;
use crate::cancel::CancellationToken;

/// Which pass of the chain is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Running before the main processor call, over the prompt.
    Pre,
    /// Running after the main processor call, over the response.
    Post,
}

/// Per-request mutable state shared between handlers within one chain pass.
///
/// All reads/writes to `state`, `metadata`, and the audit log are
/// serialised by an internal lock per field; handlers never see a
/// partially-updated map. Once [`ProcessingContext::is_blocked`] becomes
/// `true`, no handler invariant in this crate re-opens it; only
/// [`ProcessingContext::fork`] produces a context that starts unblocked
/// again.
pub struct ProcessingContext {
    request_id: String,
    pipeline_id: String,
    prompt: RwLock<String>,
    response: RwLock<Option<String>>,
    phase: RwLock<Phase>,
    block_reason: RwLock<Option<String>>,
    modified: RwLock<bool>,
    metadata: RwLock<Map<String, Value>>,
    state: RwLock<Map<String, Value>>,
    audit_log: RwLock<Vec<AuditEntry>>,
    start_time: Instant,
    cancellation: CancellationToken,
}

impl ProcessingContext {
    /// Create a new context for `pipeline_id` with the given initial prompt.
    ///
    /// A fresh `request_id` (UUID v4) is generated.
    #[must_use]
    pub fn new(pipeline_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_request_id(Uuid::new_v4().to_string(), pipeline_id, prompt)
    }

    /// Create a new context with an explicit `request_id`.
    ///
    /// If `request_id` is empty, one is generated, matching the "generated
    /// if absent" behaviour from the component spec.
    #[must_use]
    pub fn with_request_id(
        request_id: impl Into<String>,
        pipeline_id: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        let request_id = request_id.into();
        let request_id = if request_id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            request_id
        };
        Self {
            request_id,
            pipeline_id: pipeline_id.into(),
            prompt: RwLock::new(prompt.into()),
            response: RwLock::new(None),
            phase: RwLock::new(Phase::Pre),
            block_reason: RwLock::new(None),
            modified: RwLock::new(false),
            metadata: RwLock::new(Map::new()),
            state: RwLock::new(Map::new()),
            audit_log: RwLock::new(Vec::new()),
            start_time: Instant::now(),
            cancellation: CancellationToken::new(),
        }
    }

    /// The request id (generated if none was supplied at construction).
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The pipeline this context is executing under.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// The currently active phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.read().expect("phase lock poisoned")
    }

    /// Switch to `phase`.
    pub fn set_phase(&self, phase: Phase) {
        *self.phase.write().expect("phase lock poisoned") = phase;
    }

    /// The prompt text, regardless of phase.
    #[must_use]
    pub fn prompt(&self) -> String {
        self.prompt.read().expect("prompt lock poisoned").clone()
    }

    /// Overwrite the prompt text.
    pub fn set_prompt(&self, text: impl Into<String>) {
        *self.prompt.write().expect("prompt lock poisoned") = text.into();
    }

    /// The response text, if the main processor has run.
    #[must_use]
    pub fn response(&self) -> Option<String> {
        self.response.read().expect("response lock poisoned").clone()
    }

    /// Overwrite the response text.
    pub fn set_response(&self, text: impl Into<String>) {
        *self.response.write().expect("response lock poisoned") = Some(text.into());
    }

    /// The text for the active phase: `prompt` when `Phase::Pre`, `response`
    /// (or `""` if unset) when `Phase::Post`.
    #[must_use]
    pub fn current_text(&self) -> String {
        match self.phase() {
            Phase::Pre => self.prompt(),
            Phase::Post => self.response().unwrap_or_default(),
        }
    }

    /// Write to whichever slot [`current_text`](Self::current_text) reads
    /// from, and mark the context modified.
    pub fn set_current_text(&self, text: impl Into<String>) {
        let text = text.into();
        match self.phase() {
            Phase::Pre => self.set_prompt(text),
            Phase::Post => self.set_response(text),
        }
        self.set_modified();
    }

    /// `true` once [`block`](Self::block) has been called.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.block_reason.read().expect("block lock poisoned").is_some()
    }

    /// The reason passed to the first [`block`](Self::block) call, if any.
    #[must_use]
    pub fn block_reason(&self) -> Option<String> {
        self.block_reason.read().expect("block lock poisoned").clone()
    }

    /// Mark this context as blocked with `reason`.
    ///
    /// Idempotent: only the first call's reason is retained, matching the
    /// "block-reason is non-empty" invariant without letting a later
    /// handler (which should never run once blocked) overwrite it.
    pub fn block(&self, reason: impl Into<String>) {
        let mut guard = self.block_reason.write().expect("block lock poisoned");
        if guard.is_none() {
            *guard = Some(reason.into());
        }
    }

    /// `true` once any handler has called [`set_modified`](Self::set_modified).
    #[must_use]
    pub fn is_modified(&self) -> bool {
        *self.modified.read().expect("modified lock poisoned")
    }

    /// Mark the context modified. Idempotent.
    pub fn set_modified(&self) {
        *self.modified.write().expect("modified lock poisoned") = true;
    }

    /// Read a metadata value by key.
    #[must_use]
    pub fn metadata_get(&self, key: &str) -> Option<Value> {
        self.metadata.read().expect("metadata lock poisoned").get(key).cloned()
    }

    /// Set a metadata value by key.
    pub fn metadata_set(&self, key: impl Into<String>, value: Value) {
        self.metadata
            .write()
            .expect("metadata lock poisoned")
            .insert(key.into(), value);
    }

    /// Snapshot the full metadata map.
    #[must_use]
    pub fn metadata_snapshot(&self) -> Map<String, Value> {
        self.metadata.read().expect("metadata lock poisoned").clone()
    }

    /// Replace the entire metadata map (used when seeding a context from an
    /// incoming request).
    pub fn set_metadata(&self, metadata: Map<String, Value>) {
        *self.metadata.write().expect("metadata lock poisoned") = metadata;
    }

    /// Read a state (inter-handler scratchpad) value by key.
    #[must_use]
    pub fn state_get(&self, key: &str) -> Option<Value> {
        self.state.read().expect("state lock poisoned").get(key).cloned()
    }

    /// Set a state value by key, replacing any previous value.
    pub fn state_set(&self, key: impl Into<String>, value: Value) {
        self.state
            .write()
            .expect("state lock poisoned")
            .insert(key.into(), value);
    }

    /// Append `item` to the array stored at `key`, creating it if absent.
    ///
    /// Used by handlers (e.g. the policy handler) that accumulate a list of
    /// violations across multiple handler invocations within one pass.
    pub fn state_push(&self, key: &str, item: Value) {
        let mut guard = self.state.write().expect("state lock poisoned");
        match guard.get_mut(key) {
            Some(Value::Array(arr)) => arr.push(item),
            _ => {
                guard.insert(key.to_string(), Value::Array(vec![item]));
            }
        }
    }

    /// Snapshot the full state map.
    #[must_use]
    pub fn state_snapshot(&self) -> Map<String, Value> {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Append an entry to the audit log. Append-only: callers never remove
    /// entries.
    pub fn push_audit_entry(&self, entry: AuditEntry) {
        self.audit_log.write().expect("audit lock poisoned").push(entry);
    }

    /// Snapshot the audit log in append order.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.audit_log.read().expect("audit lock poisoned").clone()
    }

    /// Time this context was constructed.
    #[must_use]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Elapsed wall-clock time since construction.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// The ambient cancellation token for this request.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Produce an independent copy for fan-out scenarios.
    ///
    /// `state` and `metadata` are deep-copied: mutating either the original
    /// or the fork afterwards is invisible to the other. The audit log is
    /// reset to empty (so the fork's own handlers are not double-attributed
    /// to the original's log) and the cancellation token is shared, so
    /// cancelling the original also cancels every fork.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            request_id: self.request_id.clone(),
            pipeline_id: self.pipeline_id.clone(),
            prompt: RwLock::new(self.prompt()),
            response: RwLock::new(self.response()),
            phase: RwLock::new(self.phase()),
            block_reason: RwLock::new(self.block_reason()),
            modified: RwLock::new(self.is_modified()),
            metadata: RwLock::new(self.metadata_snapshot()),
            state: RwLock::new(self.state_snapshot()),
            audit_log: RwLock::new(Vec::new()),
            start_time: self.start_time,
            cancellation: self.cancellation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_generated_when_absent() {
        let ctx = ProcessingContext::with_request_id("", "default", "hi");
        assert!(!ctx.request_id().is_empty());
    }

    #[test]
    fn request_id_preserved_when_given() {
        let ctx = ProcessingContext::with_request_id("req-1", "default", "hi");
        assert_eq!(ctx.request_id(), "req-1");
    }

    #[test]
    fn current_text_follows_phase() {
        let ctx = ProcessingContext::new("default", "hello");
        assert_eq!(ctx.current_text(), "hello");

        ctx.set_phase(Phase::Post);
        assert_eq!(ctx.current_text(), "");
        ctx.set_response("world");
        assert_eq!(ctx.current_text(), "world");
    }

    #[test]
    fn set_current_text_marks_modified() {
        let ctx = ProcessingContext::new("default", "hello");
        assert!(!ctx.is_modified());
        ctx.set_current_text("[PRE] hello");
        assert!(ctx.is_modified());
        assert_eq!(ctx.prompt(), "[PRE] hello");
    }

    #[test]
    fn block_keeps_first_reason() {
        let ctx = ProcessingContext::new("default", "hello");
        assert!(!ctx.is_blocked());
        ctx.block("first");
        ctx.block("second");
        assert!(ctx.is_blocked());
        assert_eq!(ctx.block_reason().as_deref(), Some("first"));
    }

    #[test]
    fn fork_deep_copies_state_and_metadata() {
        let ctx = ProcessingContext::new("default", "hello");
        ctx.state_set("k", Value::from(1));
        ctx.metadata_set("m", Value::from("v"));

        let fork = ctx.fork();
        fork.state_set("k", Value::from(2));
        fork.metadata_set("m", Value::from("changed"));

        assert_eq!(ctx.state_get("k"), Some(Value::from(1)));
        assert_eq!(fork.state_get("k"), Some(Value::from(2)));
        assert_eq!(ctx.metadata_get("m"), Some(Value::from("v")));
        assert_eq!(fork.metadata_get("m"), Some(Value::from("changed")));
    }

    #[test]
    fn fork_resets_audit_log_but_shares_cancellation() {
        let ctx = ProcessingContext::new("default", "hello");
        ctx.push_audit_entry(AuditEntry::new("h1", Phase::Pre, 1));
        let fork = ctx.fork();
        assert!(fork.audit_log().is_empty());
        assert_eq!(ctx.audit_log().len(), 1);

        ctx.cancellation().cancel();
        assert!(fork.cancellation().is_cancelled());
    }

    #[test]
    fn state_push_accumulates_across_calls() {
        let ctx = ProcessingContext::new("default", "hello");
        ctx.state_push("violations", Value::from("v1"));
        ctx.state_push("violations", Value::from("v2"));
        let arr = ctx.state_get("violations").unwrap();
        assert_eq!(arr.as_array().unwrap().len(), 2);
    }
}
