// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`PlatonService`]: the three in-memory catalogs (handlers via the
//! chain, pipelines, policies) plus the `Process*`/`TestPolicy`/
//! `HealthCheck` operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use platon_chain::{Chain, Handler, HandlerType, MainProcessor, ProcessResult};
use platon_config::ConfigurationReader;
use platon_context::ProcessingContext;
use platon_error::{ErrorCode, PlatonError};
use platon_handlers::{compile_rules, decide, evaluate, Policy, PolicyHandler};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::info;

use crate::catalog::Catalog;
use crate::handler_info::{HandlerInfo, RegisterDynamicHandlerRequest};
use crate::pipeline::Pipeline;
use crate::request::{HealthStatus, ProcessRequest, TestPolicyRequest, TestPolicyResult};

const DEFAULT_MAX_HANDLERS: i64 = 100;
const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 30;

/// The service-level facade: catalogs, configuration, and the operations
/// documented as the RPC surface.
pub struct PlatonService {
    chain: Arc<Chain>,
    pipelines: Catalog<Pipeline>,
    policies: Catalog<Policy>,
    handler_meta: RwLock<HashMap<String, (String, bool)>>,
    max_handlers: i64,
    default_pipeline: String,
    default_handler_timeout: Duration,
    started_at: Instant,
}

impl PlatonService {
    /// Construct a service with defaults read from `config`, and seed the
    /// `"default"` pipeline.
    pub async fn with_config(config: &dyn ConfigurationReader) -> Self {
        let max_handlers = config.get_int("service.max_handlers", DEFAULT_MAX_HANDLERS);
        let default_pipeline = config.get_string("service.default_pipeline", "default");
        let default_handler_timeout = config.get_duration(
            "service.default_handler_timeout",
            Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS),
        );

        let service = Self {
            chain: Arc::new(Chain::new()),
            pipelines: Catalog::new(),
            policies: Catalog::new(),
            handler_meta: RwLock::new(HashMap::new()),
            max_handlers,
            default_pipeline,
            default_handler_timeout,
            started_at: Instant::now(),
        };
        service.load_default_pipeline().await;
        service
    }

    /// A service with built-in defaults and no attached configuration
    /// reader.
    pub async fn new() -> Self {
        Self::with_config(&platon_config::MapConfigReader::new()).await
    }

    /// The underlying handler chain, for callers that need direct access
    /// (e.g. to run `process_pre`/`process_post` without going through the
    /// service's request/response DTOs).
    #[must_use]
    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    // -- Pipeline management --------------------------------------------

    /// Idempotently insert the reserved `"default"` pipeline.
    pub async fn load_default_pipeline(&self) {
        if !self.pipelines.contains("default").await {
            let _ = self.pipelines.create("default", Pipeline::default_pipeline()).await;
        }
    }

    /// Create a new pipeline; refuses an id already present.
    pub async fn create_pipeline(&self, mut pipeline: Pipeline) -> Result<Pipeline, PlatonError> {
        let now = chrono::Utc::now();
        pipeline.created_at = now;
        pipeline.updated_at = now;
        self.pipelines.create(pipeline.id.clone(), pipeline.clone()).await?;
        Ok(pipeline)
    }

    /// Update a pipeline by id, preserving `created_at`.
    pub async fn update_pipeline(&self, id: &str, mut pipeline: Pipeline) -> Result<Pipeline, PlatonError> {
        self.pipelines
            .update(id, |existing| {
                pipeline.created_at = existing.created_at;
                pipeline.updated_at = chrono::Utc::now();
                pipeline.clone()
            })
            .await
    }

    /// Hard-delete a pipeline by id.
    pub async fn delete_pipeline(&self, id: &str) -> Result<(), PlatonError> {
        self.pipelines.delete(id).await
    }

    /// Fetch a pipeline by id.
    pub async fn get_pipeline(&self, id: &str) -> Result<Pipeline, PlatonError> {
        self.pipelines.get(id).await
    }

    /// List every pipeline.
    pub async fn list_pipelines(&self) -> Vec<Pipeline> {
        self.pipelines.list().await
    }

    // -- Policy management -----------------------------------------------

    /// Create a new policy; refuses an id already present.
    pub async fn create_policy(&self, mut policy: Policy) -> Result<Policy, PlatonError> {
        let now = chrono::Utc::now();
        policy.created_at = now;
        policy.updated_at = now;
        self.policies.create(policy.id.clone(), policy.clone()).await?;
        Ok(policy)
    }

    /// Update a policy by id, preserving `created_at`.
    pub async fn update_policy(&self, id: &str, mut policy: Policy) -> Result<Policy, PlatonError> {
        self.policies
            .update(id, |existing| {
                policy.created_at = existing.created_at;
                policy.updated_at = chrono::Utc::now();
                policy.clone()
            })
            .await
    }

    /// Hard-delete a policy by id.
    pub async fn delete_policy(&self, id: &str) -> Result<(), PlatonError> {
        self.policies.delete(id).await
    }

    /// Fetch a policy by id.
    pub async fn get_policy(&self, id: &str) -> Result<Policy, PlatonError> {
        self.policies.get(id).await
    }

    /// List every policy.
    pub async fn list_policies(&self) -> Vec<Policy> {
        self.policies.list().await
    }

    /// Evaluate `req.policy`'s rules against `req.test_text` without
    /// touching any live context or catalog.
    pub async fn test_policy(&self, req: &TestPolicyRequest) -> Result<TestPolicyResult, PlatonError> {
        let start = Instant::now();
        let compiled = compile_rules(&req.policy.rules)?;
        let outcome = evaluate(&req.policy.id, &req.policy.name, &compiled, &req.test_text);
        let decision = decide(&outcome);
        let reason = outcome
            .block_reason
            .clone()
            .unwrap_or_else(|| format!("{decision:?} after evaluating {} rule(s)", req.policy.rules.len()));

        Ok(TestPolicyResult {
            decision,
            violations: outcome.violations,
            modified_text: outcome.text,
            reason,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    // -- Handler management -----------------------------------------------

    /// Register a natively-constructed handler (e.g. a built-in
    /// [`PolicyHandler`] or `AuditHandler` wired at boot).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::QuotaExceeded`] if the chain is already at
    /// `max_handlers`.
    pub async fn register_handler(&self, handler: Arc<dyn Handler>) -> Result<HandlerInfo, PlatonError> {
        self.enforce_handler_quota().await?;
        let info = HandlerInfo {
            name: handler.name().to_string(),
            handler_type: handler.handler_type(),
            priority: handler.priority(),
            description: String::new(),
            enabled: true,
        };
        self.chain.register(handler).await;
        Ok(info)
    }

    /// Register a policy's rules as a live [`PolicyHandler`] in the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::InvalidInput`] if any rule's pattern fails to
    /// compile, or [`ErrorCode::QuotaExceeded`] past the handler cap.
    pub async fn register_policy_handler(&self, policy: Policy) -> Result<HandlerInfo, PlatonError> {
        let handler = Arc::new(PolicyHandler::new(policy)?);
        self.register_handler(handler).await
    }

    /// Register a named, pass-through ordering slot via RPC.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::DuplicateEntry`] if `req.name` is already
    /// registered, or [`ErrorCode::QuotaExceeded`] past the handler cap.
    pub async fn register_dynamic_handler(&self, req: RegisterDynamicHandlerRequest) -> Result<HandlerInfo, PlatonError> {
        if self.chain.contains(&req.name).await {
            return Err(PlatonError::new(ErrorCode::DuplicateEntry, format!("handler '{}' already registered", req.name))
                .with_detail("name", &req.name));
        }
        self.enforce_handler_quota().await?;

        let handler = Arc::new(platon_handlers::DynamicHandler::new(
            req.name.clone(),
            req.handler_type,
            req.priority,
            req.description.clone(),
            req.config.settings.clone(),
        ));
        handler.set_enabled(req.config.enabled);
        self.chain.register(handler).await;

        self.handler_meta
            .write()
            .await
            .insert(req.name.clone(), (req.description.clone(), req.config.enabled));

        Ok(HandlerInfo {
            name: req.name,
            handler_type: req.handler_type,
            priority: req.priority,
            description: req.description,
            enabled: req.config.enabled,
        })
    }

    async fn enforce_handler_quota(&self) -> Result<(), PlatonError> {
        let current = self.chain.len().await as i64;
        if current >= self.max_handlers {
            return Err(
                PlatonError::new(ErrorCode::QuotaExceeded, format!("handler chain is at its cap of {}", self.max_handlers))
                    .with_detail("max_handlers", self.max_handlers),
            );
        }
        Ok(())
    }

    /// Unregister a handler by name.
    pub async fn unregister_handler(&self, name: &str) -> Result<(), PlatonError> {
        if self.chain.unregister(name).await {
            self.handler_meta.write().await.remove(name);
            Ok(())
        } else {
            Err(PlatonError::new(ErrorCode::NotFound, format!("handler '{name}' not found")).with_detail("name", name))
        }
    }

    /// Fetch a handler's info by name.
    pub async fn get_handler(&self, name: &str) -> Result<HandlerInfo, PlatonError> {
        let handler = self
            .chain
            .get(name)
            .await
            .ok_or_else(|| PlatonError::new(ErrorCode::NotFound, format!("handler '{name}' not found")).with_detail("name", name))?;
        Ok(self.to_handler_info(&handler).await)
    }

    /// List every registered handler.
    pub async fn list_handlers(&self) -> Vec<HandlerInfo> {
        let mut out = Vec::new();
        for handler in self.chain.list().await {
            out.push(self.to_handler_info(&handler).await);
        }
        out
    }

    async fn to_handler_info(&self, handler: &Arc<dyn Handler>) -> HandlerInfo {
        let meta = self.handler_meta.read().await.get(handler.name()).cloned();
        let (description, enabled) = meta.unwrap_or_else(|| (String::new(), true));
        HandlerInfo {
            name: handler.name().to_string(),
            handler_type: handler.handler_type(),
            priority: handler.priority(),
            description,
            enabled,
        }
    }

    // -- Processing --------------------------------------------------------

    /// Reject requests with neither a non-empty prompt nor response.
    pub fn validate_request(&self, req: &ProcessRequest) -> Result<(), PlatonError> {
        let prompt_present = !req.prompt.trim().is_empty();
        let response_present = req.response.as_deref().map(|r| !r.trim().is_empty()).unwrap_or(false);
        if !prompt_present && !response_present {
            return Err(PlatonError::new(
                ErrorCode::ValidationFailed,
                "request must supply a non-empty prompt or response",
            ));
        }
        Ok(())
    }

    fn build_context(&self, req: &ProcessRequest) -> ProcessingContext {
        let pipeline_id = if req.pipeline_id.trim().is_empty() {
            self.default_pipeline.clone()
        } else {
            req.pipeline_id.clone()
        };
        let ctx = ProcessingContext::with_request_id(req.id.clone().unwrap_or_default(), pipeline_id, req.prompt.clone());
        ctx.set_metadata(req.metadata.clone());
        if let Some(response) = &req.response {
            ctx.set_response(response.clone());
        }
        ctx
    }

    /// Run only the pre-pass over `req`, bounded by
    /// `service.default_handler_timeout`.
    pub async fn process_pre(&self, req: &ProcessRequest) -> Result<ProcessResult, PlatonError> {
        self.validate_request(req)?;
        let ctx = self.build_context(req);
        self.run_bounded(self.chain.process_pre(&ctx), "ProcessPre").await?;
        Ok(ProcessResult::freeze(&ctx))
    }

    /// Run only the post-pass over `req`, bounded by
    /// `service.default_handler_timeout`.
    pub async fn process_post(&self, req: &ProcessRequest) -> Result<ProcessResult, PlatonError> {
        self.validate_request(req)?;
        let ctx = self.build_context(req);
        self.run_bounded(self.chain.process_post(&ctx), "ProcessPost").await?;
        Ok(ProcessResult::freeze(&ctx))
    }

    /// Run the full pre → main-processor → post orchestration over `req`,
    /// bounded by `service.default_handler_timeout`.
    pub async fn process(&self, req: &ProcessRequest, main_processor: &dyn MainProcessor) -> Result<ProcessResult, PlatonError> {
        self.validate_request(req)?;
        let ctx = self.build_context(req);
        self.run_bounded(self.chain.process(&ctx, main_processor), "Process").await?;
        Ok(ProcessResult::freeze(&ctx))
    }

    /// Time-box a chain pass to `default_handler_timeout`, wrapping either a
    /// timeout or a chain-dispatch failure into a [`PlatonError`].
    async fn run_bounded<F>(&self, fut: F, operation: &str) -> Result<(), PlatonError>
    where
        F: std::future::Future<Output = Result<(), PlatonError>>,
    {
        match tokio::time::timeout(self.default_handler_timeout, fut).await {
            Ok(result) => result.map_err(|e| PlatonError::wrap(ErrorCode::Internal, format!("{operation} failed"), e)),
            Err(_) => Err(PlatonError::new(ErrorCode::Timeout, format!("{operation} exceeded the handler timeout"))
                .with_detail("timeout_ms", self.default_handler_timeout.as_millis() as u64)),
        }
    }

    // -- Health --------------------------------------------------------

    /// Report liveness plus a handful of catalog-size diagnostics.
    pub async fn health_check(&self) -> HealthStatus {
        let mut details = Map::new();
        details.insert("handler_count".to_string(), Value::from(self.chain.len().await));
        details.insert("pipeline_count".to_string(), Value::from(self.pipelines.list().await.len()));
        details.insert("policy_count".to_string(), Value::from(self.policies.list().await.len()));

        info!(uptime_seconds = self.started_at.elapsed().as_secs(), "platon.service: health check");

        HealthStatus {
            status: "ok".to_string(),
            service: "platon".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMainProcessor;
    use async_trait::async_trait;
    use chrono::Utc;
    use platon_handlers::{PolicyAction, PolicyRule, PolicyType};

    struct SlowHandler;

    #[async_trait]
    impl Handler for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }
        fn handler_type(&self) -> HandlerType {
            HandlerType::Pre
        }
        fn priority(&self) -> i32 {
            1
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            true
        }
        async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn pipeline(id: &str) -> Pipeline {
        let now = Utc::now();
        Pipeline {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            enabled: true,
            pre_handlers: Vec::new(),
            post_handlers: Vec::new(),
            config: Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn policy(id: &str, rules: Vec<PolicyRule>) -> Policy {
        let now = Utc::now();
        Policy {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            policy_type: PolicyType::Content,
            enabled: true,
            priority: 1,
            rules,
            llm_check: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn default_pipeline_seeded_idempotently() {
        let service = PlatonService::new().await;
        service.load_default_pipeline().await;
        assert_eq!(service.list_pipelines().await.len(), 1);
        assert!(service.get_pipeline("default").await.is_ok());
    }

    #[tokio::test]
    async fn pipeline_crud_refuses_duplicate_and_preserves_created_at() {
        let service = PlatonService::new().await;
        let created = service.create_pipeline(pipeline("p1")).await.unwrap();
        let dup = service.create_pipeline(pipeline("p1")).await;
        assert_eq!(dup.unwrap_err().code, ErrorCode::DuplicateEntry);

        let mut update = pipeline("p1");
        update.name = "renamed".to_string();
        let updated = service.update_pipeline("p1", update).await.unwrap();
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.name, "renamed");

        service.delete_pipeline("p1").await.unwrap();
        assert_eq!(service.get_pipeline("p1").await.unwrap_err().code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn scenario_s6_duplicate_dynamic_handler_rejected() {
        let service = PlatonService::new().await;
        let req = RegisterDynamicHandlerRequest {
            name: "slot-a".to_string(),
            handler_type: HandlerType::Pre,
            priority: 10,
            description: "reserve ordering".to_string(),
            config: Default::default(),
        };
        service.register_dynamic_handler(req.clone()).await.unwrap();
        let err = service.register_dynamic_handler(req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateEntry);
    }

    #[tokio::test]
    async fn handler_quota_enforced() {
        let config = platon_config::MapConfigReader::new();
        config.set("service.max_handlers", Value::from(1)).unwrap();
        let service = PlatonService::with_config(&config).await;

        service
            .register_dynamic_handler(RegisterDynamicHandlerRequest {
                name: "slot-a".to_string(),
                handler_type: HandlerType::Pre,
                priority: 1,
                description: String::new(),
                config: Default::default(),
            })
            .await
            .unwrap();

        let err = service
            .register_dynamic_handler(RegisterDynamicHandlerRequest {
                name: "slot-b".to_string(),
                handler_type: HandlerType::Pre,
                priority: 2,
                description: String::new(),
                config: Default::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_policy_matches_scenario_s1() {
        let service = PlatonService::new().await;
        let rules = vec![PolicyRule {
            id: "r1".to_string(),
            pattern: "forbidden".to_string(),
            action: PolicyAction::Block,
            message: "blocked".to_string(),
            replacement: "[REDACTED]".to_string(),
            case_sensitive: true,
        }];
        let result = service
            .test_policy(&TestPolicyRequest {
                policy: policy("p1", rules),
                test_text: "This contains forbidden content".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result.decision, platon_handlers::PolicyDecision::Block);
        assert_eq!(result.violations.len(), 1);
    }

    #[tokio::test]
    async fn process_validates_empty_request() {
        let service = PlatonService::new().await;
        let req = ProcessRequest {
            id: None,
            pipeline_id: "default".to_string(),
            prompt: String::new(),
            response: None,
            metadata: Map::new(),
        };
        let err = service.process(&req, &MockMainProcessor).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn process_pre_times_out_on_slow_handler() {
        let config = platon_config::MapConfigReader::new();
        config.set("service.default_handler_timeout", Value::from(0.01)).unwrap();
        let service = PlatonService::with_config(&config).await;
        service.register_handler(Arc::new(SlowHandler)).await.unwrap();

        let req = ProcessRequest {
            id: None,
            pipeline_id: "default".to_string(),
            prompt: "Hello".to_string(),
            response: None,
            metadata: Map::new(),
        };
        let err = service.process_pre(&req).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn full_process_runs_main_processor_between_passes() {
        let service = PlatonService::new().await;
        let req = ProcessRequest {
            id: None,
            pipeline_id: "default".to_string(),
            prompt: "Hello".to_string(),
            response: None,
            metadata: Map::new(),
        };
        let result = service.process(&req, &MockMainProcessor).await.unwrap();
        assert_eq!(result.processed_response.as_deref(), Some("Echo: Hello"));
    }
}
