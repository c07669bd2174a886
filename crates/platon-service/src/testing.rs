// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory stand-ins for the `MainProcessor` and `LLMExecutor`
//! collaborators, for use in this crate's own test suite (no concrete
//! network client is implemented for either; both are peer microservices
//! in production).

use async_trait::async_trait;
use platon_chain::MainProcessor;
use platon_context::ProcessingContext;
use platon_error::PlatonError;
use platon_handlers::LLMExecutor;

/// Echoes the prompt back prefixed with `"Echo: "`.
pub struct MockMainProcessor;

#[async_trait]
impl MainProcessor for MockMainProcessor {
    async fn call(&self, _ctx: &ProcessingContext, prompt: &str) -> Result<String, PlatonError> {
        Ok(format!("Echo: {prompt}"))
    }
}

/// Always reports the analyzed text as safe.
pub struct MockLlmExecutor;

#[async_trait]
impl LLMExecutor for MockLlmExecutor {
    async fn execute(&self, _model: &str, _prompt: &str, _temperature: f32) -> Result<String, PlatonError> {
        Ok("This content looks safe.".to_string())
    }
}
