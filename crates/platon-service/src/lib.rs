// SPDX-License-Identifier: MIT OR Apache-2.0
//! Catalogs, CRUD, and the HTTP surface for the Platon mediation pipeline.
//!
//! [`PlatonService`] owns the handler chain, the pipeline catalog, and the
//! policy catalog, and implements the `Process*`/handler-management/
//! pipeline-management/policy-management/`TestPolicy`/`HealthCheck`
//! operations. [`http::router`] exposes them as JSON routes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod handler_info;
mod pipeline;
mod request;
mod service;

/// The axum router and `AppState`.
pub mod http;
/// In-memory collaborator stand-ins for this crate's own test suite.
pub mod testing;

pub use catalog::Catalog;
pub use handler_info::{HandlerConfigInput, HandlerInfo, RegisterDynamicHandlerRequest};
pub use http::{router, ApiError, AppState};
pub use pipeline::Pipeline;
pub use request::{HealthStatus, ProcessRequest, TestPolicyRequest, TestPolicyResult};
pub use service::PlatonService;
