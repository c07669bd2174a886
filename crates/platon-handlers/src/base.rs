// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`BaseHandler`]: the name/type/priority/enabled fields shared by every
//! concrete handler in this crate, composed in rather than inherited.

use platon_chain::HandlerType;
use platon_context::ProcessingContext;
use std::sync::atomic::{AtomicBool, Ordering};

/// Common fields a concrete [`platon_chain::Handler`] embeds.
///
/// `should_process` defaults to the `enabled` flag; concrete handlers that
/// need extra gating call [`BaseHandler::enabled`] themselves inside their
/// own `should_process` override.
pub struct BaseHandler {
    name: String,
    handler_type: HandlerType,
    priority: i32,
    enabled: AtomicBool,
}

impl BaseHandler {
    /// Construct a new base with the handler enabled.
    #[must_use]
    pub fn new(name: impl Into<String>, handler_type: HandlerType, priority: i32) -> Self {
        Self {
            name: name.into(),
            handler_type,
            priority,
            enabled: AtomicBool::new(true),
        }
    }

    /// Handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler type.
    #[must_use]
    pub fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    /// Dispatch priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `true` if the handler is currently enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enable or disable the handler.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Default `should_process`: the enabled flag. `ctx` is unused here but
    /// kept in the signature so callers match `Handler::should_process`.
    #[must_use]
    pub fn should_process(&self, _ctx: &ProcessingContext) -> bool {
        self.enabled()
    }
}
