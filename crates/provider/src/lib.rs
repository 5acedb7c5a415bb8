//! Generation provider client
//!
//! Defines credentials (standard keys vs privileged bearer tokens), the HTTP
//! client for the external generation API, and the provider error type that
//! the rotation layer classifies. The client performs a local model-tier
//! fallback: the primary (higher-capability) model is tried first and any
//! failure retries the same request on the fallback model with the same
//! credential. Credential rotation is not this crate's concern.

pub mod client;
pub mod credential;
pub mod image;

pub use client::{GenClient, GenerateRequest, GenerateResponse};
pub use credential::{Credential, CredentialKind, PRIVILEGED_TOKEN_PREFIX};
pub use image::{ImageData, parse_data_uri, to_data_uri};

/// Errors from provider calls.
///
/// `Http` preserves the upstream status and body verbatim so the rotation
/// layer can classify rate-limit signals and callers keep the original
/// payload for diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}

/// Result alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
