// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`DynamicHandler`]: an RPC-registered, pass-through ordering slot.

use async_trait::async_trait;
use platon_chain::{Handler, HandlerType};
use platon_context::ProcessingContext;
use platon_error::PlatonError;
use serde_json::{Map, Value};

use crate::base::BaseHandler;

/// A named ordering slot an operator pre-declares via `RegisterDynamicHandler`.
///
/// Its `process` is a no-op: the handler exists purely to reserve a
/// position in the chain and bind a free-form settings map that external
/// tooling can read back via `GetHandler`.
pub struct DynamicHandler {
    base: BaseHandler,
    /// Human-readable description supplied at registration.
    pub description: String,
    /// Free-form settings the registering caller attached.
    pub settings: Map<String, Value>,
}

impl DynamicHandler {
    /// Construct a new dynamic handler.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        handler_type: HandlerType,
        priority: i32,
        description: impl Into<String>,
        settings: Map<String, Value>,
    ) -> Self {
        Self {
            base: BaseHandler::new(name, handler_type, priority),
            description: description.into(),
            settings,
        }
    }

    /// Enable or disable this slot.
    pub fn set_enabled(&self, enabled: bool) {
        self.base.set_enabled(enabled);
    }
}

#[async_trait]
impl Handler for DynamicHandler {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn handler_type(&self) -> HandlerType {
        self.base.handler_type()
    }

    fn priority(&self) -> i32 {
        self.base.priority()
    }

    fn should_process(&self, ctx: &ProcessingContext) -> bool {
        self.base.should_process(ctx)
    }

    async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
        Ok(())
    }
}
