//! Error types: the HTTP-facing [`AppError`] and the structured
//! [`ConnectorError`] taxonomy used throughout the connector subsystem.
//!
//! [`AppError`] wraps [`anyhow::Error`] and converts it into an appropriate
//! HTTP response automatically via [`IntoResponse`]. This means every handler
//! that can fail can return `Result<T, AppError>` and propagate errors with `?`
//! — no manual `map_err`, no boilerplate.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn my_handler(
//!     State(state): State<Arc<RouterState>>,
//! ) -> Result<Json<Value>, AppError> {
//!     let result = state.some_fallible_operation().await?;
//!     Ok(Json(result))
//! }
//! ```

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::security::log_sanitize::sanitize;

/// Wraps [`anyhow::Error`] so it can be returned from axum handlers.
///
/// Any type that implements `Into<anyhow::Error>` (which includes `io::Error`,
/// `reqwest::Error`, and any `#[derive(thiserror::Error)]` type) can be
/// converted into an [`AppError`] via the blanket [`From`] implementation.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "handler error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

/// Convert any `Into<anyhow::Error>` into an [`AppError`].
///
/// This is the idiomatic axum pattern — see
/// <https://docs.rs/axum/latest/axum/error_handling/index.html>.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// Connector error taxonomy (spec §7)
// ──────────────────────────────────────────────────────────────────────────────

/// Taxonomy of failure kinds from spec §7. Not every kind carries distinct
/// Rust type information — `kind` is a best-effort classification chosen at
/// the construction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    Authorization,
    Validation,
    NotFound,
    Timeout,
    EnterpriseFeature,
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::Connectivity => "connectivity",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::EnterpriseFeature => "enterprise_feature",
            Self::Transient => "transient",
        })
    }
}

/// A structured failure from any connector or configuration operation.
///
/// Carries enough context (`connector_name`, `operation`) to be logged
/// usefully without the caller needing to know which backend failed ahead of
/// time, and chains to an underlying `cause` so callers can walk
/// `std::error::Error::source` to find a sentinel like
/// [`EnterpriseFeatureError`].
#[derive(Debug, thiserror::Error)]
#[error("{connector_name}.{operation}: {message}")]
pub struct ConnectorError {
    pub connector_name: String,
    pub operation: String,
    pub message: String,
    pub kind: ErrorKind,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConnectorError {
    pub fn new(
        connector_name: impl Into<String>,
        operation: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            connector_name: connector_name.into(),
            operation: operation.into(),
            message: message.into(),
            kind,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Render a log-safe single-line summary (CR/LF escaped, ANSI stripped,
    /// truncated) — pass this to `tracing`, never `self.message` directly.
    pub fn sanitized(&self) -> String {
        sanitize(&self.to_string())
    }

    /// `true` if this error (or anything in its cause chain) is the
    /// enterprise-feature sentinel.
    pub fn is_enterprise_feature(&self) -> bool {
        if self.kind == ErrorKind::EnterpriseFeature {
            return true;
        }
        let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(self);
        while let Some(err) = source {
            if err.downcast_ref::<EnterpriseFeatureError>().is_some() {
                return true;
            }
            source = err.source();
        }
        false
    }
}

/// Sentinel error returned by every enterprise-stub connector (spec §6).
///
/// The message intentionally points customers at a sales contact rather than
/// describing the missing feature — this is a licensing gate, not a bug.
#[derive(Debug, thiserror::Error)]
#[error("this connector requires an enterprise license — contact sales@example.com")]
pub struct EnterpriseFeatureError;

pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod connector_error_tests {
    use super::*;

    #[test]
    fn is_enterprise_feature_detects_direct_kind() {
        let err = ConnectorError::new("snowflake", "connect", ErrorKind::EnterpriseFeature, "nope");
        assert!(err.is_enterprise_feature());
    }

    #[test]
    fn is_enterprise_feature_walks_cause_chain() {
        let err = ConnectorError::new("snowflake", "connect", ErrorKind::Connectivity, "wrapped")
            .with_cause(EnterpriseFeatureError);
        assert!(err.is_enterprise_feature());
    }

    #[test]
    fn is_enterprise_feature_false_for_unrelated_error() {
        let err = ConnectorError::new("postgres", "query", ErrorKind::Timeout, "deadline exceeded");
        assert!(!err.is_enterprise_feature());
    }

    #[test]
    fn sanitized_strips_control_characters() {
        let err = ConnectorError::new("redis", "get", ErrorKind::Connectivity, "boom\r\ninjected");
        assert!(!err.sanitized().contains('\n'));
        assert!(!err.sanitized().contains('\r'));
    }
}
