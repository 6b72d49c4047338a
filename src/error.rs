use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::models::HealthStatus;

/// Failures that cross the core boundary. Provider and parse failures are
/// absorbed into flagged results and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("No enabled provider with an active status is available")]
    NoProviderAvailable,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl AppError {
    /// Machine-readable error code for programmatic handling
    fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound => "not_found",
            AppError::NoProviderAvailable => "no_provider_available",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NoProviderAvailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "error_code": self.error_code(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// A provider call that could not complete, already sorted into the health
/// status it implies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid API key: {0}")]
    InvalidKey(String),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Provider error: {0}")]
    Unexpected(String),
}

impl ProviderError {
    /// Classify a raw vendor/transport message. Vendors do not share an error
    /// vocabulary, so this matches on substrings: "unauthorized" or "invalid"
    /// first, then "not found" or "model", everything else is a connection
    /// problem.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("unauthorized") || lower.contains("invalid") {
            ProviderError::InvalidKey(message)
        } else if lower.contains("not found") || lower.contains("model") {
            ProviderError::InvalidModel(message)
        } else {
            ProviderError::Connection(message)
        }
    }

    pub fn status(&self) -> HealthStatus {
        match self {
            ProviderError::InvalidKey(_) => HealthStatus::InvalidKey,
            ProviderError::InvalidModel(_) => HealthStatus::InvalidModel,
            ProviderError::Connection(_) => HealthStatus::ConnectionError,
            ProviderError::Unexpected(_) => HealthStatus::Error,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderError::InvalidKey(m)
            | ProviderError::InvalidModel(m)
            | ProviderError::Connection(m)
            | ProviderError::Unexpected(m) => m,
        }
    }

    /// Short human explanation used in validation results.
    pub fn summary(&self) -> &'static str {
        match self {
            ProviderError::InvalidKey(_) => "Invalid API key",
            ProviderError::InvalidModel(_) => "Invalid model or model not found",
            ProviderError::Connection(_) => "Connection error",
            ProviderError::Unexpected(_) => "Unexpected provider error",
        }
    }
}
