use async_trait::async_trait;
use serde::Serialize;

use super::{request_token_set, unexpected_proof, CredentialIssuer, Proof, ProofKind};
use crate::auth::error::AuthError;
use crate::auth::token::{IssuingFlow, TokenLifetimes, TokenSet};

const DEFAULT_VERIFY_URL: &str = "http://localhost:3000/api/auth/verify-otp";

/// Phone sign-in: exchanges a phone number and the one-time code sent to it.
///
/// Requesting the code itself is the caller's concern; this issuer only
/// verifies it.
pub struct OtpIssuer {
    client: reqwest::Client,
    verify_url: String,
    lifetimes: TokenLifetimes,
}

impl OtpIssuer {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            lifetimes: TokenLifetimes::default(),
        }
    }

    pub fn with_verify_url(mut self, url: impl Into<String>) -> Self {
        self.verify_url = url.into();
        self
    }

    pub fn with_lifetimes(mut self, lifetimes: TokenLifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    phone: &'a str,
    otp: &'a str,
}

#[async_trait]
impl CredentialIssuer for OtpIssuer {
    fn kind(&self) -> ProofKind {
        ProofKind::Otp
    }

    async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError> {
        let Proof::Otp { phone, code } = proof else {
            return Err(unexpected_proof(ProofKind::Otp, proof));
        };
        let phone = phone.trim();
        let code = code.trim();
        if phone.is_empty() || code.is_empty() {
            return Err(AuthError::issuance(
                None,
                "phone number and verification code are required",
            ));
        }
        request_token_set(
            &self.client,
            &self.verify_url,
            &VerifyRequest { phone, otp: code },
            IssuingFlow::Otp,
            self.lifetimes,
            None,
        )
        .await
    }
}
