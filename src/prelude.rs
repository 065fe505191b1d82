//! Convenience re-exports for common use.

pub use crate::auth::{
    AuthError, CredentialIssuer, FileTokenStore, IssuingFlow, MemoryTokenStore, Proof, TokenSet,
    TokenStore, TokenStoreConfig,
};
pub use crate::config::SessionConfig;
pub use crate::error::{RecoverySuggestion, Result, SessionError};
pub use crate::executor::{AuthenticatedClient, RequestSpec};
pub use crate::session::{SessionManager, SessionStatus};
