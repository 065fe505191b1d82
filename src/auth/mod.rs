//! Token types, persistence, and credential issuers.

pub mod error;
pub mod issuer;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use issuer::{CredentialIssuer, Proof, ProofKind};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreConfig};
pub use token::{IssuingFlow, TokenLifetimes, TokenSet};
