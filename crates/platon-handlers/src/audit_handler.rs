// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`AuditHandler`]: structured logging of every chain pass, always
//! dispatched last.

use async_trait::async_trait;
use platon_chain::{Handler, HandlerType};
use platon_context::ProcessingContext;
use platon_error::PlatonError;
use tracing::{debug, info, warn};

/// Priority the audit handler registers at, guaranteeing it runs after
/// every other built-in or policy handler in a pass.
pub const AUDIT_HANDLER_PRIORITY: i32 = i32::MAX;

/// Emits one structured log record per chain pass.
///
/// Severity depends on the context's terminal state: `blocked` logs at
/// `warn`, `modified` (and not blocked) at `info`, otherwise `debug`.
pub struct AuditHandler {
    /// Include the prompt/response text in the log record.
    pub log_text: bool,
    /// Include the metadata map in the log record.
    pub log_metadata: bool,
    /// Include recorded policy violations in the log record.
    pub log_violations: bool,
    /// Truncate logged text fields to this many characters.
    pub max_text_len: usize,
}

impl Default for AuditHandler {
    fn default() -> Self {
        Self {
            log_text: true,
            log_metadata: false,
            log_violations: true,
            max_text_len: 500,
        }
    }
}

impl AuditHandler {
    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        if text.len() <= self.max_text_len {
            return text;
        }
        let mut end = self.max_text_len.min(text.len());
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

#[async_trait]
impl Handler for AuditHandler {
    fn name(&self) -> &str {
        "audit"
    }

    fn handler_type(&self) -> HandlerType {
        HandlerType::Both
    }

    fn priority(&self) -> i32 {
        AUDIT_HANDLER_PRIORITY
    }

    fn should_process(&self, _ctx: &ProcessingContext) -> bool {
        true
    }

    async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
        let text = if self.log_text {
            self.truncate(&ctx.current_text()).to_string()
        } else {
            String::new()
        };
        let violation_count = if self.log_violations {
            ctx.state_get("policy_violations")
                .and_then(|v| v.as_array().map(|a| a.len()))
                .unwrap_or(0)
        } else {
            0
        };

        if ctx.is_blocked() {
            warn!(
                request_id = ctx.request_id(),
                phase = ?ctx.phase(),
                reason = ctx.block_reason().as_deref().unwrap_or(""),
                violations = violation_count,
                "platon.audit: request blocked"
            );
        } else if ctx.is_modified() {
            info!(
                request_id = ctx.request_id(),
                phase = ?ctx.phase(),
                text_preview = %text,
                violations = violation_count,
                "platon.audit: request modified"
            );
        } else {
            debug!(
                request_id = ctx.request_id(),
                phase = ?ctx.phase(),
                "platon.audit: request passed through unchanged"
            );
        }

        if self.log_metadata {
            debug!(request_id = ctx.request_id(), metadata = ?ctx.metadata_snapshot(), "platon.audit: metadata");
        }

        Ok(())
    }
}
