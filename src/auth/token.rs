use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sign-in flow that produced a session. Diagnostic only; refresh is
/// flow-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssuingFlow {
    Google,
    Otp,
    Password,
}

/// Default lifetimes applied when an issuer omits `expires_in` or
/// `refresh_expires_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::hours(4),
            refresh: Duration::days(30),
        }
    }
}

/// The persisted session: an access/refresh token pair with absolute expiries.
///
/// The access token never outlives the refresh token; constructors clamp
/// `access_expires_at` to `refresh_expires_at`.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use storefront_session::auth::{IssuingFlow, TokenSet};
///
/// let now = Utc::now();
/// let tokens = TokenSet::new(
///     "access",
///     "refresh",
///     now + Duration::hours(4),
///     now + Duration::days(30),
///     IssuingFlow::Password,
/// );
/// assert!(!tokens.needs_refresh(now, Duration::minutes(5)));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    access_token: String,
    refresh_token: String,
    access_expires_at: DateTime<Utc>,
    refresh_expires_at: DateTime<Utc>,
    issuing_flow: IssuingFlow,
    /// Identity-provider token kept for provider sign-out (Google flow).
    provider_token: Option<String>,
}

impl TokenSet {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
        issuing_flow: IssuingFlow,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            access_expires_at: access_expires_at.min(refresh_expires_at),
            refresh_expires_at,
            issuing_flow,
            provider_token: None,
        }
    }

    /// Attach the identity provider's token; empty strings are ignored.
    pub fn with_provider_token(mut self, token: Option<String>) -> Self {
        self.provider_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn access_expires_at(&self) -> DateTime<Utc> {
        self.access_expires_at
    }

    pub fn refresh_expires_at(&self) -> DateTime<Utc> {
        self.refresh_expires_at
    }

    pub fn issuing_flow(&self) -> IssuingFlow {
        self.issuing_flow
    }

    pub fn provider_token(&self) -> Option<&str> {
        self.provider_token.as_deref()
    }

    /// True once `now` is within `skew` of the access token's expiry.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now >= self.access_expires_at - skew
    }

    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .field("issuing_flow", &self.issuing_flow)
            .field(
                "provider_token",
                &self.provider_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
