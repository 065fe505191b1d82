use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::{request_token_set, unexpected_proof, CredentialIssuer, Proof, ProofKind};
use crate::auth::error::AuthError;
use crate::auth::token::{IssuingFlow, TokenLifetimes, TokenSet};

const DEFAULT_EXCHANGE_URL: &str = "http://localhost:3000/api/auth/google";
const DEFAULT_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Provider-side sign-out for a federated identity.
///
/// Called when the local session is terminated so that the next sign-in asks
/// for account selection instead of silently reusing a cached identity.
#[async_trait]
pub trait ProviderSignOut: Send + Sync {
    /// `provider_token` is the Google token persisted with the session being
    /// terminated, if the sign-in produced one.
    async fn sign_out(&self, provider_token: Option<&str>) -> Result<(), AuthError>;
}

/// Google sign-in: exchanges a Google ID token for a storefront session.
///
/// The Google access token (returned by the exchange as `provider_token`, or
/// supplied with the proof) is stored with the session so sign-out can revoke
/// it from any process.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use storefront_session::auth::issuer::{GoogleIssuer, RevokeSignOut};
///
/// let client = reqwest::Client::new();
/// let issuer = GoogleIssuer::new(client.clone())
///     .with_exchange_url("https://shop.example.com/api/auth/google")
///     .with_sign_out(Arc::new(RevokeSignOut::new(client)));
/// ```
pub struct GoogleIssuer {
    client: reqwest::Client,
    exchange_url: String,
    lifetimes: TokenLifetimes,
    sign_out: Option<Arc<dyn ProviderSignOut>>,
}

impl GoogleIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            exchange_url: DEFAULT_EXCHANGE_URL.to_string(),
            lifetimes: TokenLifetimes::default(),
            sign_out: None,
        }
    }

    pub fn with_exchange_url(mut self, url: impl Into<String>) -> Self {
        self.exchange_url = url.into();
        self
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    pub fn with_sign_out(mut self, sign_out: Arc<dyn ProviderSignOut>) -> Self {
        self.sign_out = Some(sign_out);
        self
    }
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    id_token: &'a str,
}

#[async_trait]
impl CredentialIssuer for GoogleIssuer {
    fn kind(&self) -> ProofKind {
        ProofKind::Google
    }

    async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError> {
        let Proof::Google {
            id_token,
            access_token,
        } = proof
        else {
            return Err(unexpected_proof(ProofKind::Google, proof));
        };
        if id_token.trim().is_empty() {
            return Err(AuthError::issuance(None, "Google ID token is empty"));
        }
        let tokens = request_token_set(
            &self.client,
            &self.exchange_url,
            &ExchangeRequest { id_token },
            IssuingFlow::Google,
            self.lifetimes,
            None,
        )
        .await?;
        if tokens.provider_token().is_some() {
            return Ok(tokens);
        }
        Ok(tokens.with_provider_token(access_token.clone()))
    }

    async fn sign_out(&self, session: &TokenSet) -> Result<(), AuthError> {
        match &self.sign_out {
            Some(hook) => hook.sign_out(session.provider_token()).await,
            None => {
                tracing::debug!("no Google sign-out hook configured");
                Ok(())
            }
        }
    }
}

/// Revokes the stored Google token at Google's OAuth revocation endpoint.
pub struct RevokeSignOut {
    client: reqwest::Client,
    revoke_url: String,
}

impl RevokeSignOut {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            revoke_url: DEFAULT_REVOKE_URL.to_string(),
        }
    }

    pub fn with_revoke_url(mut self, url: impl Into<String>) -> Self {
        self.revoke_url = url.into();
        self
    }
}

#[async_trait]
impl ProviderSignOut for RevokeSignOut {
    async fn sign_out(&self, provider_token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = provider_token else {
            return Err(AuthError::issuance(
                None,
                "no Google token stored with the session; provider session not revoked",
            ));
        };
        let resp = self
            .client
            .post(&self.revoke_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[("token", token)])
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        // Google answers 400 for tokens that are already invalid.
        if status == reqwest::StatusCode::BAD_REQUEST {
            tracing::debug!("Google token already invalid at revoke");
            return Ok(());
        }
        Err(AuthError::issuance(
            Some(status.as_u16()),
            format!("Google sign-out failed with status {status}"),
        ))
    }
}
