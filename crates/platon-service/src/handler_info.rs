// SPDX-License-Identifier: MIT OR Apache-2.0
//! DTOs for the handler-management operations.

use platon_chain::HandlerType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of a registered handler, returned by
/// `RegisterHandler`/`GetHandler`/`ListHandlers`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HandlerInfo {
    /// Unique handler name.
    pub name: String,
    /// Which pass(es) the handler runs in.
    pub handler_type: HandlerType,
    /// Dispatch priority.
    pub priority: i32,
    /// Description supplied at registration (empty for natively-constructed
    /// handlers that did not go through `RegisterDynamicHandler`).
    #[serde(default)]
    pub description: String,
    /// Whether the handler was registered enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Input for `RegisterDynamicHandler`: declares a named, pass-through
/// ordering slot bound to a free-form settings map.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterDynamicHandlerRequest {
    /// Unique handler name.
    pub name: String,
    /// Which pass(es) the handler runs in.
    #[serde(rename = "type")]
    pub handler_type: HandlerType,
    /// Dispatch priority.
    pub priority: i32,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Enabled flag and free-form settings.
    #[serde(default)]
    pub config: HandlerConfigInput,
}

/// The `config` sub-record of [`RegisterDynamicHandlerRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HandlerConfigInput {
    /// Whether the slot starts enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-form settings an external tool can read back.
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl Default for HandlerConfigInput {
    fn default() -> Self {
        Self {
            enabled: true,
            settings: Map::new(),
        }
    }
}
