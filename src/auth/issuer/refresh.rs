use async_trait::async_trait;
use serde::Serialize;

use super::{
    request_token_set, unexpected_proof, CredentialIssuer, PriorRefresh, Proof, ProofKind,
};
use crate::auth::error::AuthError;
use crate::auth::token::{TokenLifetimes, TokenSet};

const DEFAULT_REFRESH_URL: &str = "http://localhost:3000/api/auth/refresh";

/// Mints a new access token from a refresh token, whatever flow created it.
///
/// When the endpoint does not rotate the refresh token, the previous one is
/// carried over together with its expiry.
pub struct RefreshIssuer {
    client: reqwest::Client,
    refresh_url: String,
    lifetimes: TokenLifetimes,
}

impl RefreshIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            refresh_url: DEFAULT_REFRESH_URL.to_string(),
            lifetimes: TokenLifetimes::default(),
        }
    }

    pub fn with_refresh_url(mut self, url: impl Into<String>) -> Self {
        self.refresh_url = url.into();
        self
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[async_trait]
impl CredentialIssuer for RefreshIssuer {
    fn kind(&self) -> ProofKind {
        ProofKind::Refresh
    }

    async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError> {
        let Proof::Refresh {
            refresh_token,
            refresh_expires_at,
            flow,
            provider_token,
        } = proof
        else {
            return Err(unexpected_proof(ProofKind::Refresh, proof));
        };
        request_token_set(
            &self.client,
            &self.refresh_url,
            &RefreshRequest { refresh_token },
            *flow,
            self.lifetimes,
            Some(PriorRefresh {
                token: refresh_token,
                expires_at: *refresh_expires_at,
                provider_token: provider_token.as_deref(),
            }),
        )
        .await
    }
}
