// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured error taxonomy for the Platon mediation pipeline.
//!
//! Every [`PlatonError`] carries a stable, machine-readable [`ErrorCode`], a
//! human-readable message, a [`Severity`], a capture timestamp, free-form
//! `details`, and an optional wrapped cause. The taxonomy and HTTP-status
//! mapping below are authoritative for any gateway fronting this crate's
//! callers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum depth of the wrapped-cause chain before it is truncated.
pub const MAX_WRAP_DEPTH: usize = 15;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Catch-all for codes with no narrower home.
    Generic,
    /// Authentication / authorization failures.
    Auth,
    /// Database / storage failures.
    Database,
    /// Business-rule or domain-invariant violations.
    Business,
    /// Upstream service availability failures.
    Service,
    /// Pipeline-language (policy rule / handler script) failures.
    PipelineLanguage,
    /// Configuration loading or validation failures.
    Configuration,
    /// Request validation failures.
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generic => "generic",
            Self::Auth => "auth",
            Self::Database => "database",
            Self::Business => "business",
            Self::Service => "service",
            Self::PipelineLanguage => "pipeline_language",
            Self::Configuration => "configuration",
            Self::Validation => "validation",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that will not
/// change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Generic --
    /// Unclassified failure.
    Unknown,
    /// Unexpected internal failure.
    Internal,
    /// Requested resource does not exist.
    NotFound,
    /// Caller-supplied input is malformed.
    InvalidInput,
    /// Operation did not complete within its deadline.
    Timeout,

    // -- Auth --
    /// Caller is not authenticated.
    Unauthorized,
    /// Caller is authenticated but not permitted to perform the operation.
    Forbidden,
    /// Supplied token is malformed, expired, or unrecognised.
    InvalidToken,
    /// Supplied credentials do not match any known principal.
    InvalidCredentials,

    // -- Database --
    /// A database operation failed.
    Database,
    /// A connection to a backing store could not be established.
    ConnectionFailed,

    // -- Business --
    /// A domain-level business rule was violated.
    BusinessRule,
    /// The requested operation is not valid in the current state.
    InvalidOperation,
    /// The target resource is locked by another operation.
    ResourceLocked,
    /// A configured quota has been exceeded.
    QuotaExceeded,
    /// A catalog entry with the same identifying key already exists.
    DuplicateEntry,

    // -- Service --
    /// A required upstream service is unavailable.
    ServiceUnavailable,
    /// Persisted or in-memory state has been found corrupted.
    DataCorruption,
    /// The hosting environment is mis-provisioned (missing resource, bad permission, ...).
    EnvironmentError,

    // -- Pipeline language --
    /// A policy rule or handler expression failed to parse.
    SyntaxError,
    /// A policy rule or handler expression is syntactically valid but semantically wrong.
    SemanticError,
    /// The caller lacks permission to invoke a pipeline-language operation.
    PermissionError,
    /// A pipeline-language expression failed during evaluation.
    ExecutionError,
    /// A pipeline-language expression referenced an object that does not exist.
    ObjectNotFound,

    // -- Configuration --
    /// A configuration value is missing or malformed.
    ConfigInvalid,

    // -- Validation --
    /// Request-level validation failed (see `details` for the offending field).
    ValidationFailed,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unknown | Self::Internal | Self::NotFound | Self::InvalidInput | Self::Timeout => {
                ErrorCategory::Generic
            }
            Self::Unauthorized | Self::Forbidden | Self::InvalidToken | Self::InvalidCredentials => {
                ErrorCategory::Auth
            }
            Self::Database | Self::ConnectionFailed => ErrorCategory::Database,
            Self::BusinessRule
            | Self::InvalidOperation
            | Self::ResourceLocked
            | Self::QuotaExceeded
            | Self::DuplicateEntry => ErrorCategory::Business,
            Self::ServiceUnavailable | Self::DataCorruption | Self::EnvironmentError => {
                ErrorCategory::Service
            }
            Self::SyntaxError
            | Self::SemanticError
            | Self::PermissionError
            | Self::ExecutionError
            | Self::ObjectNotFound => ErrorCategory::PipelineLanguage,
            Self::ConfigInvalid => ErrorCategory::Configuration,
            Self::ValidationFailed => ErrorCategory::Validation,
        }
    }

    /// Stable `&'static str` representation (e.g. `"NOT_FOUND"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Internal => "INTERNAL",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Timeout => "TIMEOUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Database => "DATABASE",
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::BusinessRule => "BUSINESS_RULE",
            Self::InvalidOperation => "INVALID_OPERATION",
            Self::ResourceLocked => "RESOURCE_LOCKED",
            Self::QuotaExceeded => "QUOTA_EXCEEDED",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::EnvironmentError => "ENVIRONMENT_ERROR",
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::SemanticError => "SEMANTIC_ERROR",
            Self::PermissionError => "PERMISSION_ERROR",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::ObjectNotFound => "OBJECT_NOT_FOUND",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::ValidationFailed => "VALIDATION_FAILED",
        }
    }

    /// HTTP status code an API gateway should map this error to.
    ///
    /// Authoritative per the category/status table in the component spec.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound | Self::ObjectNotFound => 404,
            Self::Unauthorized | Self::InvalidToken | Self::InvalidCredentials => 401,
            Self::Forbidden | Self::PermissionError => 403,
            Self::InvalidInput | Self::ValidationFailed | Self::SyntaxError | Self::SemanticError => 400,
            Self::DuplicateEntry | Self::ResourceLocked | Self::InvalidOperation => 409,
            Self::QuotaExceeded => 429,
            Self::Timeout => 408,
            Self::ServiceUnavailable | Self::Database | Self::ConnectionFailed => 503,
            _ => 500,
        }
    }

    /// Default [`Severity`] for this code, used unless explicitly overridden.
    #[must_use]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::DataCorruption | Self::ServiceUnavailable | Self::EnvironmentError => {
                Severity::Critical
            }
            Self::Database | Self::ConnectionFailed | Self::InvalidCredentials => Severity::High,
            Self::BusinessRule
            | Self::QuotaExceeded
            | Self::Timeout
            | Self::InvalidOperation
            | Self::ResourceLocked => Severity::Medium,
            Self::ValidationFailed | Self::NotFound | Self::ObjectNotFound | Self::SyntaxError => {
                Severity::Low
            }
            _ => Severity::Medium,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Operator-facing severity used for alerting and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected, low-impact failure (e.g. validation, not-found).
    Low,
    /// Business-relevant but non-urgent.
    Medium,
    /// Requires prompt attention.
    High,
    /// Requires immediate attention.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TraceFrame
// ---------------------------------------------------------------------------

/// One frame of the captured wrap chain, recorded innermost-first.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TraceFrame {
    /// Error code at this frame.
    pub code: ErrorCode,
    /// Message at this frame.
    pub message: String,
    /// Operation name at this frame, if any.
    pub operation: Option<String>,
}

// ---------------------------------------------------------------------------
// PlatonError
// ---------------------------------------------------------------------------

/// Structured, serializable error used across the Platon pipeline.
///
/// Use [`PlatonError::new`] to construct, then the `with_*` builder methods
/// to attach context, and [`PlatonError::wrap`] to chain an outer error over
/// an inner cause.
///
/// # Examples
///
/// ```
/// use platon_error::{ErrorCode, PlatonError};
///
/// let err = PlatonError::new(ErrorCode::NotFound, "pipeline 'default' not found")
///     .with_operation("GetPipeline")
///     .with_detail("pipeline_id", "default");
/// assert_eq!(err.code, ErrorCode::NotFound);
/// assert_eq!(err.http_status(), 404);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlatonError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Severity, defaulted from `code` unless explicitly overridden.
    pub severity: Severity,
    /// UTC timestamp this error was constructed.
    pub timestamp: DateTime<Utc>,
    /// Arbitrary structured diagnostic context.
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
    /// Name of the operation that raised this error, if known.
    #[serde(default)]
    pub operation: Option<String>,
    /// Processing-context id associated with this error, if any.
    #[serde(default)]
    pub context_id: Option<String>,
    /// User id associated with this error, if any.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Request id associated with this error, if any.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Correlation id for cross-service tracing, if any.
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Captured call trace, innermost-first, capped at [`MAX_WRAP_DEPTH`].
    #[serde(default)]
    pub trace: Vec<TraceFrame>,
    /// Boxed wrapped cause, if this error wraps another.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<PlatonError>>,
}

impl PlatonError {
    /// Create a new error with the given code and message.
    ///
    /// Severity defaults from [`ErrorCode::default_severity`]; use
    /// [`PlatonError::with_severity`] to override.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let severity = code.default_severity();
        Self {
            code,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            details: BTreeMap::new(),
            operation: None,
            context_id: None,
            user_id: None,
            request_id: None,
            correlation_id: None,
            trace: Vec::new(),
            source: None,
        }
    }

    /// Attach a key-value pair to the diagnostic `details` map.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails the entry is silently skipped.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    /// Set the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the processing-context id.
    #[must_use]
    pub fn with_context_id(mut self, id: impl Into<String>) -> Self {
        self.context_id = Some(id.into());
        self
    }

    /// Set the user id.
    #[must_use]
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Override the default severity derived from `code`.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Wrap `inner` as the cause of a new error at `code`/`message`.
    ///
    /// The inner error's trace is extended with a frame for `inner` itself
    /// and carried forward. If the resulting depth would exceed
    /// [`MAX_WRAP_DEPTH`], the chain is truncated and flattened: the trace is
    /// capped to the oldest `MAX_WRAP_DEPTH` frames, a `"truncated": true`
    /// detail is recorded, the cause is dropped, and severity is promoted to
    /// [`Severity::High`] (if it was not already [`Severity::Critical`]).
    #[must_use]
    pub fn wrap(code: ErrorCode, message: impl Into<String>, inner: PlatonError) -> Self {
        let mut trace = inner.trace.clone();
        trace.push(TraceFrame {
            code: inner.code,
            message: inner.message.clone(),
            operation: inner.operation.clone(),
        });

        let mut out = Self::new(code, message);
        out.details = inner.details.clone();
        out.context_id = inner.context_id.clone();
        out.user_id = inner.user_id.clone();
        out.request_id = inner.request_id.clone();
        out.correlation_id = inner.correlation_id.clone();

        if trace.len() > MAX_WRAP_DEPTH {
            trace.truncate(MAX_WRAP_DEPTH);
            out.trace = trace;
            out.details.insert(
                "truncated".to_string(),
                serde_json::Value::Bool(true),
            );
            out.severity = out.severity.max(Severity::High);
            out.source = None;
        } else {
            out.trace = trace;
            out.source = Some(Box::new(inner));
        }
        out
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.http_status()`.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// Depth of the wrap chain, counting `self`.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.trace.len()
    }
}

impl fmt::Display for PlatonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.details.is_empty() {
            if let Ok(details) = serde_json::to_string(&self.details) {
                write!(f, " {details}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PlatonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}
