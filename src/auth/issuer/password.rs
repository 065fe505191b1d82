use async_trait::async_trait;
use serde::Serialize;

use super::{request_token_set, unexpected_proof, CredentialIssuer, Proof, ProofKind};
use crate::auth::error::AuthError;
use crate::auth::token::{IssuingFlow, TokenLifetimes, TokenSet};

const DEFAULT_LOGIN_URL: &str = "http://localhost:3000/api/auth/login";

/// Email/password login against the storefront API.
pub struct PasswordIssuer {
    client: reqwest::Client,
    login_url: String,
    lifetimes: TokenLifetimes,
}

impl PasswordIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            login_url: DEFAULT_LOGIN_URL.to_string(),
            lifetimes: TokenLifetimes::default(),
        }
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[async_trait]
impl CredentialIssuer for PasswordIssuer {
    fn kind(&self) -> ProofKind {
        ProofKind::Password
    }

    async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError> {
        let Proof::Password { email, password } = proof else {
            return Err(unexpected_proof(ProofKind::Password, proof));
        };
        request_token_set(
            &self.client,
            &self.login_url,
            &LoginRequest { email, password },
            IssuingFlow::Password,
            self.lifetimes,
            None,
        )
        .await
    }
}
