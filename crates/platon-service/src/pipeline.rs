// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Pipeline`] catalog record.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named, operator-managed pipeline configuration.
///
/// Dispatch itself runs over the single process-wide handler chain (see
/// `platon-chain::Chain`); a `Pipeline` record is the catalog entry an
/// operator edits to describe which handlers a logical pipeline expects
/// to be wired, plus free-form config. The id `"default"` is reserved for
/// the pipeline [`crate::PlatonService::load_default_pipeline`] seeds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Pipeline {
    /// Unique id within the pipeline catalog.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Whether this pipeline is active.
    pub enabled: bool,
    /// Ordered pre-handler names this pipeline expects.
    #[serde(default)]
    pub pre_handlers: Vec<String>,
    /// Ordered post-handler names this pipeline expects.
    #[serde(default)]
    pub post_handlers: Vec<String>,
    /// Free-form configuration.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    /// The reserved `"default"` pipeline: enabled, empty handler lists.
    #[must_use]
    pub fn default_pipeline() -> Self {
        let now = Utc::now();
        Self {
            id: "default".to_string(),
            name: "default".to_string(),
            description: String::new(),
            enabled: true,
            pre_handlers: Vec::new(),
            post_handlers: Vec::new(),
            config: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
