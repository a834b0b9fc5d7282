use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::TransportFailurePolicy;
use crate::notification::DeliveryStatus;

/// Why a transport-level failure happened before any HTTP status was seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// Could not reach the provider
    Connect,
    /// Provider did not answer within the configured timeout
    Timeout,
    /// Anything else (malformed response, request build failure, ...)
    Other,
}

/// Failures of a single dispatch pass.
///
/// None of these ever reach the host: the pipeline folds each one into the
/// event's [`DeliveryStatus`] via [`DispatchError::delivery_status`].
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Push delivery is not configured")]
    NotConfigured,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Transport error ({kind:?}): {message}")]
    Transport {
        kind: TransportFailure,
        message: String,
    },

    #[error("Provider rejected push: HTTP {status_code}")]
    ProviderRejected { status_code: u16, body: String },

    #[error("Provider unavailable: HTTP {status_code}")]
    ProviderUnavailable { status_code: u16, body: String },
}

impl DispatchError {
    pub fn transport(kind: TransportFailure, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    /// Status to persist for this failure. `None` means leave the event untouched.
    pub fn delivery_status(&self, policy: TransportFailurePolicy) -> Option<DeliveryStatus> {
        match self {
            DispatchError::NotConfigured => None,
            DispatchError::ProviderUnavailable { .. } => Some(DeliveryStatus::RetryableError),
            DispatchError::Transport {
                kind: TransportFailure::Connect | TransportFailure::Timeout,
                ..
            } if policy == TransportFailurePolicy::Retryable => Some(DeliveryStatus::RetryableError),
            DispatchError::NotFound(_)
            | DispatchError::Format(_)
            | DispatchError::Transport { .. }
            | DispatchError::ProviderRejected { .. } => Some(DeliveryStatus::Fatal),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotConfigured => "not_configured",
            DispatchError::NotFound(_) => "not_found",
            DispatchError::Format(_) => "format",
            DispatchError::Transport { .. } => "transport",
            DispatchError::ProviderRejected { .. } => "provider_rejected",
            DispatchError::ProviderUnavailable { .. } => "provider_unavailable",
        }
    }
}

/// Errors surfaced by the embedded HTTP router
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, log_message) = match &self {
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone()),
        };

        let client_message = if is_production() {
            "Internal server error".to_string()
        } else {
            log_message.clone()
        };

        tracing::error!(code = %code, message = %log_message, "API error");

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
