// SPDX-License-Identifier: MIT OR Apache-2.0
//! The priority-ordered handler chain: two independently-sorted handler
//! lists (pre, post) and the dispatch logic that walks them.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use platon_context::{AuditEntry, Phase, ProcessingContext};
use platon_error::{ErrorCode, PlatonError};
use tokio::sync::RwLock;

use crate::handler::{Handler, HandlerType};
use crate::observer;

/// The downstream LLM dispatcher the chain calls between the pre- and
/// post-passes.
#[async_trait]
pub trait MainProcessor: Send + Sync {
    /// Produce a response for `prompt`.
    async fn call(&self, ctx: &ProcessingContext, prompt: &str) -> Result<String, PlatonError>;
}

/// Owns the pre- and post-handler lists and implements snapshot-then-
/// iterate dispatch.
///
/// Registering a handler re-sorts the affected list(s) ascending by
/// priority, stable on ties (new entries sort after existing ties,
/// preserving registration order).
#[derive(Default)]
pub struct Chain {
    pre: RwLock<Vec<Arc<dyn Handler>>>,
    post: RwLock<Vec<Arc<dyn Handler>>>,
}

impl Chain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pre: RwLock::new(Vec::new()),
            post: RwLock::new(Vec::new()),
        }
    }

    /// Register `handler` into the list(s) matching its [`HandlerType`].
    pub async fn register(&self, handler: Arc<dyn Handler>) {
        match handler.handler_type() {
            HandlerType::Pre => Self::insert_sorted(&self.pre, handler).await,
            HandlerType::Post => Self::insert_sorted(&self.post, handler).await,
            HandlerType::Both => {
                Self::insert_sorted(&self.pre, handler.clone()).await;
                Self::insert_sorted(&self.post, handler).await;
            }
        }
    }

    async fn insert_sorted(list: &RwLock<Vec<Arc<dyn Handler>>>, handler: Arc<dyn Handler>) {
        let mut guard = list.write().await;
        guard.push(handler);
        guard.sort_by_key(|h| h.priority());
    }

    /// Remove the handler named `name` from both lists.
    ///
    /// Returns `true` if it was present in either list.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed_pre = {
            let mut guard = self.pre.write().await;
            let before = guard.len();
            guard.retain(|h| h.name() != name);
            before != guard.len()
        };
        let removed_post = {
            let mut guard = self.post.write().await;
            let before = guard.len();
            guard.retain(|h| h.name() != name);
            before != guard.len()
        };
        removed_pre || removed_post
    }

    /// Fetch a handler by name, if registered.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        if let Some(h) = self.pre.read().await.iter().find(|h| h.name() == name) {
            return Some(h.clone());
        }
        self.post.read().await.iter().find(|h| h.name() == name).cloned()
    }

    /// List every registered handler, deduplicating `Both`-typed handlers
    /// that appear in both lists.
    pub async fn list(&self) -> Vec<Arc<dyn Handler>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for h in self.pre.read().await.iter() {
            if seen.insert(h.name().to_string()) {
                out.push(h.clone());
            }
        }
        for h in self.post.read().await.iter() {
            if seen.insert(h.name().to_string()) {
                out.push(h.clone());
            }
        }
        out
    }

    /// Number of distinct registered handlers (dedup'd, as in
    /// [`list`](Self::list)).
    pub async fn len(&self) -> usize {
        self.list().await.len()
    }

    /// `true` if no handler is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// `true` if a handler named `name` is registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Run the pre-pass: sets `ctx`'s phase to [`Phase::Pre`] and dispatches
    /// the pre-handler list.
    pub async fn process_pre(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
        ctx.set_phase(Phase::Pre);
        let snapshot = self.pre.read().await.clone();
        Self::dispatch(&snapshot, ctx, Phase::Pre).await
    }

    /// Run the post-pass: sets `ctx`'s phase to [`Phase::Post`] and
    /// dispatches the post-handler list.
    pub async fn process_post(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
        ctx.set_phase(Phase::Post);
        let snapshot = self.post.read().await.clone();
        Self::dispatch(&snapshot, ctx, Phase::Post).await
    }

    /// Full orchestration: pre-pass, main processor call (unless blocked),
    /// post-pass.
    pub async fn process(
        &self,
        ctx: &ProcessingContext,
        main_processor: &dyn MainProcessor,
    ) -> Result<(), PlatonError> {
        self.process_pre(ctx).await?;
        if ctx.is_blocked() {
            return Ok(());
        }
        let response = main_processor.call(ctx, &ctx.prompt()).await?;
        ctx.set_response(response);
        self.process_post(ctx).await
    }

    async fn dispatch(
        handlers: &[Arc<dyn Handler>],
        ctx: &ProcessingContext,
        phase: Phase,
    ) -> Result<(), PlatonError> {
        for handler in handlers {
            if ctx.cancellation().is_cancelled() {
                return Err(PlatonError::new(ErrorCode::Internal, "processing cancelled")
                    .with_operation(handler.name()));
            }
            if ctx.is_blocked() {
                return Ok(());
            }
            if !handler.should_process(ctx) {
                continue;
            }

            let was_modified = ctx.is_modified();
            let start = Instant::now();
            let result = handler.process(ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let flipped_modified = !was_modified && ctx.is_modified();

            let entry = AuditEntry::new(handler.name(), phase, duration_ms)
                .with_modified(flipped_modified);

            match result {
                Ok(()) => {
                    observer::notify(&entry);
                    ctx.push_audit_entry(entry);
                }
                Err(err) => {
                    let entry = entry.with_error(err.to_string());
                    observer::notify(&entry);
                    ctx.push_audit_entry(entry);
                    return Err(PlatonError::wrap(
                        ErrorCode::Internal,
                        format!("handler '{}' failed", handler.name()),
                        err,
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingHandler {
        name: String,
        handler_type: HandlerType,
        priority: i32,
        order: Arc<RwLock<Vec<String>>>,
    }

    #[async_trait]
    impl Handler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }
        fn handler_type(&self) -> HandlerType {
            self.handler_type
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            true
        }
        async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
            self.order.write().await.push(self.name.clone());
            Ok(())
        }
    }

    struct BlockingHandler {
        priority: i32,
    }

    #[async_trait]
    impl Handler for BlockingHandler {
        fn name(&self) -> &str {
            "blocker"
        }
        fn handler_type(&self) -> HandlerType {
            HandlerType::Pre
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            true
        }
        async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
            ctx.block("bad");
            Ok(())
        }
    }

    struct FailingHandler {
        priority: i32,
    }

    #[async_trait]
    impl Handler for FailingHandler {
        fn name(&self) -> &str {
            "exploder"
        }
        fn handler_type(&self) -> HandlerType {
            HandlerType::Pre
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            true
        }
        async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
            Err(PlatonError::new(ErrorCode::Internal, "boom"))
        }
    }

    struct DisabledHandler;

    #[async_trait]
    impl Handler for DisabledHandler {
        fn name(&self) -> &str {
            "disabled"
        }
        fn handler_type(&self) -> HandlerType {
            HandlerType::Pre
        }
        fn priority(&self) -> i32 {
            0
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            false
        }
        async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
            panic!("should never be called");
        }
    }

    #[tokio::test]
    async fn handlers_run_in_priority_order_with_stable_ties() {
        let chain = Chain::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        for (name, priority) in [("b", 5), ("a", 5), ("c", 1)] {
            chain
                .register(Arc::new(RecordingHandler {
                    name: name.to_string(),
                    handler_type: HandlerType::Pre,
                    priority,
                    order: order.clone(),
                }))
                .await;
        }
        let ctx = ProcessingContext::new("default", "hello");
        chain.process_pre(&ctx).await.unwrap();
        assert_eq!(*order.read().await, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn skipped_handler_produces_no_audit_entry() {
        let chain = Chain::new();
        chain.register(Arc::new(DisabledHandler)).await;
        let ctx = ProcessingContext::new("default", "hello");
        chain.process_pre(&ctx).await.unwrap();
        assert!(ctx.audit_log().is_empty());
    }

    #[tokio::test]
    async fn blocked_short_circuits_remaining_handlers() {
        let chain = Chain::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        chain.register(Arc::new(BlockingHandler { priority: 1 })).await;
        chain
            .register(Arc::new(RecordingHandler {
                name: "after".to_string(),
                handler_type: HandlerType::Pre,
                priority: 2,
                order: order.clone(),
            }))
            .await;
        let ctx = ProcessingContext::new("default", "hello");
        chain.process_pre(&ctx).await.unwrap();
        assert!(ctx.is_blocked());
        assert_eq!(ctx.block_reason().as_deref(), Some("bad"));
        assert_eq!(ctx.audit_log().len(), 1);
        assert!(order.read().await.is_empty());
    }

    #[tokio::test]
    async fn failing_handler_wraps_error_with_handler_name() {
        let chain = Chain::new();
        chain.register(Arc::new(FailingHandler { priority: 1 })).await;
        let ctx = ProcessingContext::new("default", "hello");
        let err = chain.process_pre(&ctx).await.unwrap_err();
        assert!(err.message.contains("exploder"));
        assert_eq!(ctx.audit_log().len(), 1);
        assert!(ctx.audit_log()[0].error.is_some());
    }

    #[tokio::test]
    async fn cancelled_context_aborts_before_any_handler() {
        let chain = Chain::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        chain
            .register(Arc::new(RecordingHandler {
                name: "a".to_string(),
                handler_type: HandlerType::Pre,
                priority: 1,
                order: order.clone(),
            }))
            .await;
        let ctx = ProcessingContext::new("default", "hello");
        ctx.cancellation().cancel();
        let err = chain.process_pre(&ctx).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(order.read().await.is_empty());
    }

    #[tokio::test]
    async fn both_type_handler_appears_in_both_lists_but_dedups_in_list() {
        struct BothHandler;
        #[async_trait]
        impl Handler for BothHandler {
            fn name(&self) -> &str {
                "both"
            }
            fn handler_type(&self) -> HandlerType {
                HandlerType::Both
            }
            fn priority(&self) -> i32 {
                1
            }
            fn should_process(&self, _ctx: &ProcessingContext) -> bool {
                true
            }
            async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
                Ok(())
            }
        }
        let chain = Chain::new();
        chain.register(Arc::new(BothHandler)).await;
        assert_eq!(chain.list().await.len(), 1);

        let ctx = ProcessingContext::new("default", "hello");
        chain.process_pre(&ctx).await.unwrap();
        chain.process_post(&ctx).await.unwrap();
        assert_eq!(ctx.audit_log().len(), 2);
    }

    #[tokio::test]
    async fn unregister_removes_from_both_lists() {
        struct BothHandler;
        #[async_trait]
        impl Handler for BothHandler {
            fn name(&self) -> &str {
                "both"
            }
            fn handler_type(&self) -> HandlerType {
                HandlerType::Both
            }
            fn priority(&self) -> i32 {
                1
            }
            fn should_process(&self, _ctx: &ProcessingContext) -> bool {
                true
            }
            async fn process(&self, _ctx: &ProcessingContext) -> Result<(), PlatonError> {
                Ok(())
            }
        }
        let chain = Chain::new();
        chain.register(Arc::new(BothHandler)).await;
        assert!(chain.unregister("both").await);
        assert!(chain.list().await.is_empty());
    }

    struct EchoProcessor;

    #[async_trait]
    impl MainProcessor for EchoProcessor {
        async fn call(&self, _ctx: &ProcessingContext, prompt: &str) -> Result<String, PlatonError> {
            Ok(format!("Echo: {prompt}"))
        }
    }

    struct PrependHandler;
    #[async_trait]
    impl Handler for PrependHandler {
        fn name(&self) -> &str {
            "prepend"
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
        async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
            let text = ctx.current_text();
            ctx.set_current_text(format!("[PRE] {text}"));
            Ok(())
        }
    }

    struct AppendHandler;
    #[async_trait]
    impl Handler for AppendHandler {
        fn name(&self) -> &str {
            "append"
        }
        fn handler_type(&self) -> HandlerType {
            HandlerType::Post
        }
        fn priority(&self) -> i32 {
            1
        }
        fn should_process(&self, _ctx: &ProcessingContext) -> bool {
            true
        }
        async fn process(&self, ctx: &ProcessingContext) -> Result<(), PlatonError> {
            let text = ctx.current_text();
            ctx.set_current_text(format!("{text} [POST]"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_process_orchestration_matches_scenario_s5() {
        let chain = Chain::new();
        chain.register(Arc::new(PrependHandler)).await;
        chain.register(Arc::new(AppendHandler)).await;
        let ctx = ProcessingContext::new("default", "Hello");
        chain.process(&ctx, &EchoProcessor).await.unwrap();
        assert_eq!(ctx.prompt(), "[PRE] Hello");
        assert_eq!(ctx.response().as_deref(), Some("Echo: [PRE] Hello [POST]"));
    }

    #[tokio::test]
    async fn blocked_pre_pass_skips_main_processor() {
        let chain = Chain::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter2 = counter.clone();

        struct CountingProcessor(Arc<AtomicUsize>);
        #[async_trait]
        impl MainProcessor for CountingProcessor {
            async fn call(&self, _ctx: &ProcessingContext, prompt: &str) -> Result<String, PlatonError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(prompt.to_string())
            }
        }

        chain.register(Arc::new(BlockingHandler { priority: 1 })).await;
        let ctx = ProcessingContext::new("default", "hello");
        chain.process(&ctx, &CountingProcessor(counter2)).await.unwrap();
        assert!(ctx.is_blocked());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
