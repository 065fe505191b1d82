//! Credential issuers: one per sign-in flow, plus the flow-agnostic refresher.
//!
//! Every issuer turns a [`Proof`] into a [`TokenSet`] and nothing else. Storage,
//! expiry checks, and retries live in [`crate::session::SessionManager`].

pub mod google;
pub mod otp;
pub mod password;
pub mod refresh;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::AuthError;
use super::token::{IssuingFlow, TokenLifetimes, TokenSet};

pub use google::{GoogleIssuer, ProviderSignOut, RevokeSignOut};
pub use otp::OtpIssuer;
pub use password::PasswordIssuer;
pub use refresh::RefreshIssuer;

/// External evidence exchanged for a token set.
#[derive(Clone, PartialEq, Eq)]
pub enum Proof {
    /// Federated identity token from Google Sign-In, plus the Google access
    /// token when the client has one (revoked on sign-out).
    Google {
        id_token: String,
        access_token: Option<String>,
    },
    /// Phone number plus the one-time code delivered to it.
    Otp { phone: String, code: String },
    Password { email: String, password: String },
    /// An existing session's refresh credential.
    Refresh {
        refresh_token: String,
        refresh_expires_at: DateTime<Utc>,
        flow: IssuingFlow,
        provider_token: Option<String>,
    },
}

impl Proof {
    pub fn google(id_token: impl Into<String>) -> Self {
        Self::Google {
            id_token: id_token.into(),
            access_token: None,
        }
    }

    pub fn google_with_access_token(
        id_token: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self::Google {
            id_token: id_token.into(),
            access_token: Some(access_token.into()),
        }
    }

    pub fn otp(phone: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Otp {
            phone: phone.into(),
            code: code.into(),
        }
    }

    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn refresh(tokens: &TokenSet) -> Self {
        Self::Refresh {
            refresh_token: tokens.refresh_token().to_string(),
            refresh_expires_at: tokens.refresh_expires_at(),
            flow: tokens.issuing_flow(),
            provider_token: tokens.provider_token().map(str::to_string),
        }
    }

    pub fn kind(&self) -> ProofKind {
        match self {
            Self::Google { .. } => ProofKind::Google,
            Self::Otp { .. } => ProofKind::Otp,
            Self::Password { .. } => ProofKind::Password,
            Self::Refresh { .. } => ProofKind::Refresh,
        }
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Google { .. } => f.debug_struct("Google").finish_non_exhaustive(),
            Self::Otp { phone, .. } => f
                .debug_struct("Otp")
                .field("phone", phone)
                .finish_non_exhaustive(),
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
            Self::Refresh { flow, .. } => f
                .debug_struct("Refresh")
                .field("flow", flow)
                .finish_non_exhaustive(),
        }
    }
}

/// Discriminant of [`Proof`], used to route a proof to its issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ProofKind {
    Google,
    Otp,
    Password,
    Refresh,
}

impl From<IssuingFlow> for ProofKind {
    fn from(flow: IssuingFlow) -> Self {
        match flow {
            IssuingFlow::Google => Self::Google,
            IssuingFlow::Otp => Self::Otp,
            IssuingFlow::Password => Self::Password,
        }
    }
}

/// Turns a flow-specific proof into a fresh [`TokenSet`].
///
/// Implementations must not touch the token store.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// The proof variant this issuer accepts.
    fn kind(&self) -> ProofKind;

    async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError>;

    /// Invalidate any provider-side session for `session` so the next
    /// sign-in re-prompts. Called after the local session is cleared.
    async fn sign_out(&self, _session: &TokenSet) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Token-set payload shared by every issuance endpoint.
///
/// Accepts both snake_case and camelCase field names.
#[derive(Debug, Deserialize)]
pub(crate) struct IssuanceResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "accessToken")]
    access_token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<i64>,
    #[serde(default, alias = "refreshExpiresIn")]
    refresh_expires_in: Option<i64>,
    /// Identity-provider token returned by federated exchanges.
    #[serde(default, alias = "providerToken")]
    provider_token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Previous refresh credential, reused when a refresh response does not
/// rotate it.
pub(crate) struct PriorRefresh<'a> {
    pub token: &'a str,
    pub expires_at: DateTime<Utc>,
    pub provider_token: Option<&'a str>,
}

impl IssuanceResponse {
    pub(crate) fn into_token_set(
        self,
        flow: IssuingFlow,
        lifetimes: TokenLifetimes,
        now: DateTime<Utc>,
        prior: Option<PriorRefresh<'_>>,
    ) -> Result<TokenSet, AuthError> {
        if self.success == Some(false) {
            return Err(AuthError::issuance(
                None,
                self.message
                    .unwrap_or_else(|| "issuer reported failure".to_string()),
            ));
        }
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::issuance(None, "issuer response missing access token"))?;

        let access_expires_at = now + lifetime(self.expires_in, lifetimes.access);
        let provider_token = self.provider_token.or_else(|| {
            prior
                .as_ref()
                .and_then(|prior| prior.provider_token.map(str::to_string))
        });
        let (refresh_token, refresh_expires_at) =
            match (self.refresh_token.filter(|t| !t.is_empty()), prior) {
                (Some(token), _) => {
                    let expires_at = now + lifetime(self.refresh_expires_in, lifetimes.refresh);
                    (token, expires_at)
                }
                (None, Some(prior)) => {
                    let expires_at = match self.refresh_expires_in {
                        Some(_) => now + lifetime(self.refresh_expires_in, lifetimes.refresh),
                        None => prior.expires_at,
                    };
                    (prior.token.to_string(), expires_at)
                }
                (None, None) => {
                    return Err(AuthError::issuance(
                        None,
                        "issuer response missing refresh token",
                    ))
                }
            };

        Ok(TokenSet::new(
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
            flow,
        )
        .with_provider_token(provider_token))
    }
}

const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn lifetime(seconds: Option<i64>, fallback: Duration) -> Duration {
    match seconds {
        Some(secs) if secs > 0 => Duration::seconds(secs.min(MAX_LIFETIME_SECS)),
        _ => fallback,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// POST `body` to an issuance endpoint and normalize the reply.
pub(crate) async fn request_token_set<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    flow: IssuingFlow,
    lifetimes: TokenLifetimes,
    prior: Option<PriorRefresh<'_>>,
) -> Result<TokenSet, AuthError> {
    let resp = client
        .post(url)
        .header("Accept", "application/json")
        .json(body)
        .send()
        .await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.message.or(body.error))
            .unwrap_or_else(|| format!("issuer request failed with status {status}"));
        return Err(AuthError::issuance(Some(status.as_u16()), message));
    }
    let payload: IssuanceResponse = serde_json::from_str(&text).map_err(|err| {
        AuthError::issuance(
            Some(status.as_u16()),
            format!("malformed issuer response: {err}"),
        )
    })?;
    payload.into_token_set(flow, lifetimes, Utc::now(), prior)
}

pub(crate) fn unexpected_proof(expected: ProofKind, proof: &Proof) -> AuthError {
    AuthError::UnsupportedProof(format!(
        "{expected} issuer cannot accept a {} proof",
        proof.kind()
    ))
}
