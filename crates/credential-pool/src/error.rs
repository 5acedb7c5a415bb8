//! Error types for rotation

use provider::ProviderError;

/// Errors surfaced by the retry/rotation executor.
///
/// Rate-limit failures are swallowed and rotated internally; only the
/// terminal outcomes appear here. Non-rate-limit provider failures pass
/// through as `Provider` with the original error intact.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no credential configured")]
    NotConfigured,

    #[error("all credentials rate limited after {attempts} attempts, wait before retrying")]
    AllExhausted { attempts: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result alias for rotation operations.
pub type Result<T> = std::result::Result<T, Error>;
