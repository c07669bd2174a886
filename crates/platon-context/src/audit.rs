// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audit log entries recorded for every handler invocation.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Phase;

/// A single record of one handler's execution within a processing pass.
///
/// Exactly one [`AuditEntry`] is appended per handler whose
/// `should_process` returned `true`, whether or not it errored (see the
/// chain dispatch invariants).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AuditEntry {
    /// Name of the handler that ran.
    pub handler_name: String,
    /// Phase the handler ran under.
    pub phase: Phase,
    /// Wall-clock duration of the handler's `process` call, in milliseconds.
    pub duration_ms: u64,
    /// Error message, if the handler returned an error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `true` iff this handler flipped the context's `modified` flag from
    /// `false` to `true` during its own invocation.
    pub modified: bool,
    /// Free-form details a handler may attach (e.g. violation counts).
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl AuditEntry {
    /// Construct a new entry with an empty `details` map.
    #[must_use]
    pub fn new(handler_name: impl Into<String>, phase: Phase, duration_ms: u64) -> Self {
        Self {
            handler_name: handler_name.into(),
            phase,
            duration_ms,
            error: None,
            modified: false,
            details: BTreeMap::new(),
        }
    }

    /// Builder: attach an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Builder: mark whether this handler caused the `modified` transition.
    #[must_use]
    pub fn with_modified(mut self, modified: bool) -> Self {
        self.modified = modified;
        self
    }

    /// Builder: attach a detail key-value pair.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }
}
