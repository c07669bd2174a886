// SPDX-License-Identifier: MIT OR Apache-2.0
//! The axum router exposing [`PlatonService`]'s operations as JSON routes.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use platon_chain::MainProcessor;
use platon_error::PlatonError;
use tower_http::trace::TraceLayer;

use crate::handler_info::{HandlerInfo, RegisterDynamicHandlerRequest};
use crate::pipeline::Pipeline;
use crate::request::{HealthStatus, ProcessRequest, TestPolicyRequest, TestPolicyResult};
use crate::service::PlatonService;

/// Shared application state: the service plus the downstream main processor
/// wired in at startup (a peer microservice in production, see
/// `testing::MockMainProcessor` for this crate's own tests).
#[derive(Clone)]
pub struct AppState {
    /// The catalogs and chain this router dispatches to.
    pub service: Arc<PlatonService>,
    /// The downstream LLM dispatcher invoked between the pre- and post-passes.
    pub main_processor: Arc<dyn MainProcessor>,
}

/// Wraps a [`PlatonError`] for the axum response layer: the HTTP status is
/// derived from `PlatonError::http_status`, and the error body is the
/// error itself (already `Serialize`).
pub struct ApiError(PlatonError);

impl From<PlatonError> for ApiError {
    fn from(err: PlatonError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

/// Build the axum router with every RPC operation wired in.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/process", post(process))
        .route("/v1/process/pre", post(process_pre))
        .route("/v1/process/post", post(process_post))
        .route("/v1/pipelines", get(list_pipelines).post(create_pipeline))
        .route(
            "/v1/pipelines/{id}",
            get(get_pipeline).put(update_pipeline).delete(delete_pipeline),
        )
        .route("/v1/policies", get(list_policies).post(create_policy))
        .route(
            "/v1/policies/{id}",
            get(get_policy).put(update_policy).delete(delete_policy),
        )
        .route("/v1/policies/test", post(test_policy))
        .route("/v1/handlers", get(list_handlers).post(register_dynamic_handler))
        .route("/v1/handlers/{name}", get(get_handler).delete(unregister_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.service.health_check().await)
}

async fn process(State(state): State<AppState>, Json(req): Json<ProcessRequest>) -> Result<impl IntoResponse, ApiError> {
    let result = state.service.process(&req, state.main_processor.as_ref()).await?;
    Ok(Json(result))
}

async fn process_pre(State(state): State<AppState>, Json(req): Json<ProcessRequest>) -> Result<impl IntoResponse, ApiError> {
    let result = state.service.process_pre(&req).await?;
    Ok(Json(result))
}

async fn process_post(State(state): State<AppState>, Json(req): Json<ProcessRequest>) -> Result<impl IntoResponse, ApiError> {
    let result = state.service.process_post(&req).await?;
    Ok(Json(result))
}

async fn list_pipelines(State(state): State<AppState>) -> Json<Vec<Pipeline>> {
    Json(state.service.list_pipelines().await)
}

async fn create_pipeline(State(state): State<AppState>, Json(pipeline): Json<Pipeline>) -> Result<impl IntoResponse, ApiError> {
    let created = state.service.create_pipeline(pipeline).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_pipeline(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let pipeline = state.service.get_pipeline(&id).await?;
    Ok(Json(pipeline))
}

async fn update_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(pipeline): Json<Pipeline>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.service.update_pipeline(&id, pipeline).await?;
    Ok(Json(updated))
}

async fn delete_pipeline(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_pipeline(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_policies(State(state): State<AppState>) -> Json<Vec<platon_handlers::Policy>> {
    Json(state.service.list_policies().await)
}

async fn create_policy(
    State(state): State<AppState>,
    Json(policy): Json<platon_handlers::Policy>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.service.create_policy(policy).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_policy(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let policy = state.service.get_policy(&id).await?;
    Ok(Json(policy))
}

async fn update_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(policy): Json<platon_handlers::Policy>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.service.update_policy(&id, policy).await?;
    Ok(Json(updated))
}

async fn delete_policy(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.service.delete_policy(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn test_policy(
    State(state): State<AppState>,
    Json(req): Json<TestPolicyRequest>,
) -> Result<Json<TestPolicyResult>, ApiError> {
    let result = state.service.test_policy(&req).await?;
    Ok(Json(result))
}

async fn list_handlers(State(state): State<AppState>) -> Json<Vec<HandlerInfo>> {
    Json(state.service.list_handlers().await)
}

async fn register_dynamic_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterDynamicHandlerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let info = state.service.register_dynamic_handler(req).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn get_handler(State(state): State<AppState>, Path(name): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let info = state.service.get_handler(&name).await?;
    Ok(Json(info))
}

async fn unregister_handler(State(state): State<AppState>, Path(name): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.service.unregister_handler(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}
