//! Service error type and HTTP mapping
//!
//! Rotation outcomes map onto the response contract the UI understands:
//! `not_configured` prompts the user for a key, `all_exhausted` tells them
//! to wait, provider rejections pass the upstream status and payload
//! through so nothing is lost for diagnostics.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use provider::ProviderError;
use thiserror::Error;

/// Errors surfaced by workflow handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error(transparent)]
    Rotation(#[from] credential_pool::Error),
}

impl ApiError {
    /// (status, error type label, message) triple for the JSON body.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            ApiError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_failure",
                msg.clone(),
            ),
            ApiError::Rotation(credential_pool::Error::NotConfigured) => (
                StatusCode::UNAUTHORIZED,
                "not_configured",
                "no API key configured, add a key in settings".into(),
            ),
            ApiError::Rotation(credential_pool::Error::AllExhausted { attempts }) => (
                StatusCode::TOO_MANY_REQUESTS,
                "all_exhausted",
                format!("all credentials rate limited ({attempts} attempts), wait and retry"),
            ),
            ApiError::Rotation(credential_pool::Error::Provider(e)) => match e {
                ProviderError::Http { status, body } => (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                    "provider_rejected",
                    body.clone(),
                ),
                ProviderError::Transport(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "upstream_unreachable",
                    msg.clone(),
                ),
                ProviderError::InvalidResponse(msg) => (
                    StatusCode::BAD_GATEWAY,
                    "invalid_provider_response",
                    msg.clone(),
                ),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.parts();
        let body = serde_json::json!({
            "error": { "type": error_type, "message": message }
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
