use thiserror::Error;

use crate::error::SessionError;

/// Normalized authentication errors across sign-in flows.
///
/// `Clone` so a single refresh outcome can be handed to every caller waiting
/// on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The issuer rejected the proof or could not be reached.
    #[error("{message}")]
    CredentialIssuance { status: Option<u16>, message: String },
    /// No valid session could be produced; the store has been cleared.
    #[error("Session expired: {0}")]
    SessionExpired(String),
    #[error("Unsupported proof: {0}")]
    UnsupportedProof(String),
    #[error("Token store error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    pub fn issuance(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::CredentialIssuance {
            status,
            message: message.into(),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    pub fn is_issuance_failure(&self) -> bool {
        matches!(self, Self::CredentialIssuance { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::CredentialIssuance {
            status: error.status().map(|s| s.as_u16()),
            message: format!("issuer unreachable: {error}"),
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for SessionError {
    fn from(error: AuthError) -> Self {
        SessionError::Auth(error)
    }
}
