// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`Handler`] trait implemented by every chain participant.

use async_trait::async_trait;
use platon_context::ProcessingContext;
use platon_error::PlatonError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which pass(es) of the chain a handler participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    /// Runs only during the pre-pass, over the prompt.
    Pre,
    /// Runs only during the post-pass, over the response.
    Post,
    /// Runs in both passes; registered into both lists.
    Both,
}

/// A chain participant.
///
/// `name` must be unique within a [`crate::Chain`]; uniqueness is enforced
/// by the catalog that registers handlers, not by the chain itself (see
/// `platon-service`'s `RegisterDynamicHandler`).
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique handler name.
    fn name(&self) -> &str;

    /// Which pass(es) this handler runs in.
    fn handler_type(&self) -> HandlerType;

    /// Dispatch priority: smaller runs earlier, ties broken by
    /// registration order.
    fn priority(&self) -> i32;

    /// Whether this handler should run for the given context.
    ///
    /// Called before every invocation; returning `false` skips the handler
    /// with no audit entry recorded.
    fn should_process(&self, ctx: &ProcessingContext) -> bool;

    /// Perform this handler's work against `ctx`.
    ///
    /// An error here is wrapped with the handler's name by the chain and
    /// aborts the remainder of the pass.
    async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError>;
}
