//! Credential kinds and classification
//!
//! A credential is an opaque string token. Privileged ("ultra") tokens carry
//! a fixed prefix and authenticate via `Authorization: Bearer`; everything
//! else is a standard key sent as a `key` query parameter. Classification
//! happens once at pool-load time so call sites never re-derive it from the
//! raw string.

use std::fmt;

/// Prefix identifying a privileged bearer token.
pub const PRIVILEGED_TOKEN_PREFIX: &str = "ut-";

/// Kind of a credential, determined by token shape.
///
/// Kind drives both the authentication mechanism and the pacing rule:
/// privileged tokens are assumed to have a generous per-minute quota and
/// are exempt from inter-call delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    StandardKey,
    PrivilegedToken,
}

impl CredentialKind {
    /// Classify a raw token string. Pure function, no validation beyond shape.
    pub fn classify(token: &str) -> Self {
        if token.starts_with(PRIVILEGED_TOKEN_PREFIX) {
            CredentialKind::PrivilegedToken
        } else {
            CredentialKind::StandardKey
        }
    }

    /// Kind label for logging and health reporting.
    pub fn label(&self) -> &'static str {
        match self {
            CredentialKind::StandardKey => "standard_key",
            CredentialKind::PrivilegedToken => "privileged_token",
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, CredentialKind::PrivilegedToken)
    }
}

/// A credential with its kind resolved at construction time.
#[derive(Clone)]
pub struct Credential {
    token: String,
    kind: CredentialKind,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let kind = CredentialKind::classify(&token);
        Self { token, kind }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }
}

// Tokens must not leak through Debug formatting of attempts or errors.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("kind", &self.kind)
            .finish()
    }
}
