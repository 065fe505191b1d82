//! Error types for storefront-session.

pub mod category;

pub use category::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

use crate::auth::AuthError;

/// Primary error type for authenticated requests and session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Auth(AuthError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(AuthError::SessionExpired(_)) => ErrorCategory::SessionExpired,
            Self::Auth(AuthError::CredentialIssuance { .. }) => ErrorCategory::CredentialRejected,
            Self::Auth(AuthError::Store(_)) => ErrorCategory::Storage,
            Self::Auth(AuthError::Serialization(_)) | Self::Serialization(_) => {
                ErrorCategory::Serialization
            }
            Self::Auth(AuthError::UnsupportedProof(_)) | Self::Configuration(_) => {
                ErrorCategory::Configuration
            }
            Self::Network(_) => ErrorCategory::Network,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.category() == ErrorCategory::SessionExpired
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::SessionExpired => RecoverySuggestion::SignInAgain,
            ErrorCategory::CredentialRejected => RecoverySuggestion::ShowMessage,
            ErrorCategory::Network => RecoverySuggestion::RetryLater,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Storage | ErrorCategory::Serialization => {
                RecoverySuggestion::ContactSupport
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SessionError>;
