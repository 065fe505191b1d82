use chrono::{DateTime, Duration, Utc};

use crate::auth::{IssuingFlow, TokenSet};

/// Snapshot of the stored session for diagnostics and UI routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    Active {
        flow: IssuingFlow,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
        /// The next `access_token()` call will refresh first.
        needs_refresh: bool,
    },
}

impl SessionStatus {
    pub(crate) fn from_tokens(tokens: Option<&TokenSet>, now: DateTime<Utc>, skew: Duration) -> Self {
        match tokens {
            Some(tokens) if !tokens.refresh_expired(now) => Self::Active {
                flow: tokens.issuing_flow(),
                access_expires_at: tokens.access_expires_at(),
                refresh_expires_at: tokens.refresh_expires_at(),
                needs_refresh: tokens.needs_refresh(now, skew),
            },
            _ => Self::SignedOut,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}
