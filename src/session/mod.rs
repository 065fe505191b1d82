//! Session lifecycle: expiry evaluation, single-flight refresh, sign-in and
//! sign-out.
//!
//! ```text
//! SignedOut --establish--> Active --refresh ok--> Active
//! Active --refresh failure | terminate--> SignedOut
//! ```

mod status;

pub use status::SessionStatus;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bon::bon;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::auth::{AuthError, CredentialIssuer, Proof, ProofKind, TokenSet, TokenStore};
use crate::util::timeout::with_timeout;

/// Renew this long before the access token expires.
pub const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(5 * 60);
/// Upper bound on any single issuer call.
pub const DEFAULT_ISSUER_TIMEOUT: Duration = Duration::from_secs(15);

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenSet, AuthError>>>;

/// Owns the device's session and hands out valid access tokens.
///
/// Cloning is cheap and every clone shares the same store and the same
/// in-flight refresh, so at most one refresh call reaches the issuer at a
/// time no matter how many requests observe an expired token.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use storefront_session::auth::issuer::{PasswordIssuer, RefreshIssuer};
/// use storefront_session::auth::{CredentialIssuer, MemoryTokenStore, Proof};
/// use storefront_session::session::SessionManager;
///
/// # async fn example() -> Result<(), storefront_session::auth::AuthError> {
/// let client = reqwest::Client::new();
/// let issuers: Vec<Arc<dyn CredentialIssuer>> = vec![Arc::new(PasswordIssuer::new(client.clone()))];
/// let session = SessionManager::builder()
///     .store(Arc::new(MemoryTokenStore::new()))
///     .refresher(Arc::new(RefreshIssuer::new(client)))
///     .issuers(issuers)
///     .build();
///
/// session.establish(Proof::password("ada@example.com", "secret")).await?;
/// let token = session.access_token().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn CredentialIssuer>,
    issuers: HashMap<ProofKind, Arc<dyn CredentialIssuer>>,
    refresh_skew: chrono::Duration,
    issuer_timeout: Duration,
    in_flight: Mutex<Option<InFlight>>,
    /// Bumped whenever the session is replaced or cleared outside a refresh.
    /// Store writes happen while holding this lock.
    epoch: Mutex<u64>,
    next_flight_id: AtomicU64,
}

struct InFlight {
    id: u64,
    refresh: SharedRefresh,
}

#[derive(Clone, Copy)]
enum Trigger<'a> {
    /// Local clock says the access token is (nearly) expired.
    Proactive,
    /// Caller demands a refresh regardless of local expiry.
    Forced,
    /// The server rejected this access token.
    Rejected(&'a str),
}

enum Plan {
    Current(TokenSet),
    Await(SharedRefresh),
}

#[bon]
impl SessionManager {
    #[builder]
    pub fn new(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn CredentialIssuer>,
        #[builder(default)] issuers: Vec<Arc<dyn CredentialIssuer>>,
        #[builder(default = DEFAULT_REFRESH_SKEW)] refresh_skew: Duration,
        #[builder(default = DEFAULT_ISSUER_TIMEOUT)] issuer_timeout: Duration,
    ) -> Self {
        let issuers = issuers
            .into_iter()
            .map(|issuer| (issuer.kind(), issuer))
            .collect();
        let refresh_skew = chrono::Duration::from_std(refresh_skew)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        Self {
            inner: Arc::new(Inner {
                store,
                refresher,
                issuers,
                refresh_skew,
                issuer_timeout,
                in_flight: Mutex::new(None),
                epoch: Mutex::new(0),
                next_flight_id: AtomicU64::new(1),
            }),
        }
    }
}

impl SessionManager {
    /// Return a valid access token, refreshing first if it is within the skew
    /// window of expiry.
    ///
    /// Fails with [`AuthError::SessionExpired`] when signed out, when the
    /// stored session cannot be read, when the refresh token has expired, or
    /// when the refresh fails; the store is cleared in all but the first case.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let tokens = self.resolve(Trigger::Proactive).await?;
        Ok(tokens.access_token().to_string())
    }

    /// Refresh now, regardless of the locally computed expiry.
    ///
    /// Joins a refresh that is already running instead of starting another.
    pub async fn force_refresh(&self) -> Result<String, AuthError> {
        let tokens = self.resolve(Trigger::Forced).await?;
        Ok(tokens.access_token().to_string())
    }

    /// Reactive refresh after the server rejected `rejected`.
    ///
    /// If the stored session already carries a different access token (some
    /// other request refreshed in the meantime), that token is returned
    /// without contacting the issuer.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String, AuthError> {
        let tokens = self.resolve(Trigger::Rejected(rejected)).await?;
        Ok(tokens.access_token().to_string())
    }

    /// Sign in with `proof`, replacing any existing session.
    ///
    /// On failure the previous session, if any, is left untouched.
    pub async fn establish(&self, proof: Proof) -> Result<(), AuthError> {
        let kind = proof.kind();
        if kind == ProofKind::Refresh {
            return Err(AuthError::UnsupportedProof(
                "a refresh token cannot establish a new session".to_string(),
            ));
        }
        let issuer = self
            .inner
            .issuers
            .get(&kind)
            .ok_or_else(|| AuthError::UnsupportedProof(format!("no issuer registered for {kind}")))?;

        let tokens = with_timeout(self.inner.issuer_timeout, issuer.issue(&proof))
            .await
            .map_err(|err| {
                warn!(flow = %kind, error = %err, "sign-in rejected");
                err
            })?;

        let mut epoch = self.inner.lock_epoch();
        self.inner.store.save(&tokens)?;
        *epoch += 1;
        info!(flow = %tokens.issuing_flow(), "session established");
        Ok(())
    }

    /// Sign out: clear the store and, for federated flows, the provider-side
    /// session.
    ///
    /// A provider sign-out failure is logged; the local session is gone
    /// either way.
    pub async fn terminate(&self) -> Result<(), AuthError> {
        let ended = {
            let mut epoch = self.inner.lock_epoch();
            let ended = match self.inner.store.load() {
                Ok(tokens) => tokens,
                Err(err) => {
                    warn!(error = %err, "unreadable session during sign-out");
                    None
                }
            };
            self.inner.store.clear()?;
            *epoch += 1;
            ended
        };
        let Some(ended) = ended else {
            info!("session terminated; nothing was stored");
            return Ok(());
        };
        let flow = ended.issuing_flow();
        info!(flow = %flow, "session terminated");

        if let Some(issuer) = self.inner.issuers.get(&ProofKind::from(flow)) {
            if let Err(err) = issuer.sign_out(&ended).await {
                warn!(flow = %flow, error = %err, "provider sign-out failed");
            }
        }
        Ok(())
    }

    /// Drop the session if it still holds `rejected`, and report it expired.
    ///
    /// Used when a request is rejected again right after a refresh.
    pub fn expire_rejected(&self, rejected: &str) -> AuthError {
        let mut epoch = self.inner.lock_epoch();
        match self.inner.store.load() {
            Ok(Some(tokens)) if tokens.access_token() == rejected => {
                if let Err(err) = self.inner.store.clear() {
                    warn!(error = %err, "failed to clear rejected session");
                }
                *epoch += 1;
                warn!(flow = %tokens.issuing_flow(), "refreshed token rejected; session cleared");
            }
            Ok(_) => debug!("rejected token already replaced"),
            Err(err) => warn!(error = %err, "unreadable session while expiring"),
        }
        AuthError::SessionExpired("access token rejected after refresh".to_string())
    }

    /// Current session state, read from the store without any network call.
    pub fn status(&self) -> Result<SessionStatus, AuthError> {
        let tokens = self.inner.store.load()?;
        Ok(SessionStatus::from_tokens(
            tokens.as_ref(),
            Utc::now(),
            self.inner.refresh_skew,
        ))
    }

    async fn resolve(&self, trigger: Trigger<'_>) -> Result<TokenSet, AuthError> {
        match self.plan(trigger)? {
            Plan::Current(tokens) => Ok(tokens),
            Plan::Await(refresh) => refresh.await,
        }
    }

    /// Decide under the in-flight lock whether to reuse the stored token,
    /// join the running refresh, or start one.
    fn plan(&self, trigger: Trigger<'_>) -> Result<Plan, AuthError> {
        let mut slot = self.inner.lock_in_flight();
        if let Some(flight) = slot.as_ref() {
            debug!(flight = flight.id, "joining in-flight refresh");
            return Ok(Plan::Await(flight.refresh.clone()));
        }

        let current = match self.inner.store.load() {
            Ok(Some(current)) => current,
            Ok(None) => return Err(AuthError::SessionExpired("not signed in".to_string())),
            Err(err) => {
                self.inner.clear_unreadable(&err);
                return Err(AuthError::SessionExpired(format!(
                    "stored session unreadable: {err}"
                )));
            }
        };

        let now = Utc::now();
        if current.refresh_expired(now) {
            self.inner.clear_expired(&current);
            return Err(AuthError::SessionExpired(
                "refresh token expired".to_string(),
            ));
        }

        match trigger {
            Trigger::Proactive if !current.needs_refresh(now, self.inner.refresh_skew) => {
                return Ok(Plan::Current(current));
            }
            Trigger::Rejected(rejected) if current.access_token() != rejected => {
                debug!("rejected token already replaced; reusing stored session");
                return Ok(Plan::Current(current));
            }
            _ => {}
        }

        let id = self.inner.next_flight_id.fetch_add(1, Ordering::Relaxed);
        let refresh = spawn_refresh(Arc::clone(&self.inner), id, current);
        *slot = Some(InFlight {
            id,
            refresh: refresh.clone(),
        });
        Ok(Plan::Await(refresh))
    }
}

/// Run the refresh on its own task so it completes and updates the store
/// even if every waiter is dropped.
fn spawn_refresh(inner: Arc<Inner>, id: u64, current: TokenSet) -> SharedRefresh {
    let epoch = *inner.lock_epoch();
    let task = tokio::spawn(async move {
        let outcome = inner.refresh(current, epoch).await;
        inner.finish_flight(id);
        outcome
    });
    async move {
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(AuthError::SessionExpired(format!(
                "refresh task aborted: {err}"
            ))),
        }
    }
    .boxed()
    .shared()
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish_flight(&self, id: u64) {
        let mut slot = self.lock_in_flight();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
    }

    fn clear_expired(&self, current: &TokenSet) {
        let mut epoch = self.lock_epoch();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear expired session");
        }
        *epoch += 1;
        info!(flow = %current.issuing_flow(), "refresh token expired; session cleared");
    }

    fn clear_unreadable(&self, cause: &AuthError) {
        let mut epoch = self.lock_epoch();
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear unreadable session");
        }
        *epoch += 1;
        warn!(error = %cause, "unreadable session cleared");
    }

    async fn refresh(&self, current: TokenSet, started_epoch: u64) -> Result<TokenSet, AuthError> {
        let flow = current.issuing_flow();
        debug!(flow = %flow, "refreshing session");
        let issued = with_timeout(
            self.issuer_timeout,
            self.refresher.issue(&Proof::refresh(&current)),
        )
        .await;

        let mut epoch = self.lock_epoch();
        if *epoch != started_epoch {
            // Signed in again or out while the refresh was running; the
            // newer state wins.
            debug!(flow = %flow, "session changed during refresh; discarding result");
            return self
                .store
                .load()?
                .ok_or_else(|| AuthError::SessionExpired("signed out during refresh".to_string()));
        }

        match issued {
            Ok(tokens) => {
                self.store.save(&tokens)?;
                info!(flow = %flow, expires_at = %tokens.access_expires_at(), "session refreshed");
                Ok(tokens)
            }
            Err(err) => {
                warn!(flow = %flow, error = %err, "refresh failed; clearing session");
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "failed to clear session after refresh failure");
                }
                *epoch += 1;
                Err(AuthError::SessionExpired(format!("refresh failed: {err}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use crate::auth::{IssuingFlow, MemoryTokenStore};

    /// Refresher that counts calls and answers after `delay`.
    struct ScriptedRefresher {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl ScriptedRefresher {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                fail,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialIssuer for ScriptedRefresher {
        fn kind(&self) -> ProofKind {
            ProofKind::Refresh
        }

        async fn issue(&self, proof: &Proof) -> Result<TokenSet, AuthError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(AuthError::issuance(Some(400), "invalid refresh token"));
            }
            let Proof::Refresh { flow, .. } = proof else {
                panic!("unexpected proof {proof:?}");
            };
            let now = Utc::now();
            Ok(TokenSet::new(
                format!("access-{n}"),
                format!("refresh-{n}"),
                now + ChronoDuration::hours(4),
                now + ChronoDuration::days(30),
                *flow,
            ))
        }
    }

    fn expiring_tokens() -> TokenSet {
        let now = Utc::now();
        TokenSet::new(
            "stale",
            "refresh-0",
            now + ChronoDuration::minutes(2),
            now + ChronoDuration::days(30),
            IssuingFlow::Otp,
        )
    }

    fn manager(store: Arc<MemoryTokenStore>, refresher: Arc<ScriptedRefresher>) -> SessionManager {
        SessionManager::builder()
            .store(store)
            .refresher(refresher)
            .build()
    }

    #[tokio::test]
    async fn signed_out_is_a_hard_failure() {
        let refresher = ScriptedRefresher::new(Duration::ZERO, false);
        let session = manager(Arc::new(MemoryTokenStore::new()), refresher.clone());
        let err = session.access_token().await.unwrap_err();
        assert!(err.is_session_expired());
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryTokenStore::with_tokens(expiring_tokens()));
        let refresher = ScriptedRefresher::new(Duration::from_millis(100), false);
        let session = manager(store, refresher.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.access_token().await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "access-1");
        }
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn forced_and_proactive_paths_share_a_flight() {
        let store = Arc::new(MemoryTokenStore::with_tokens(expiring_tokens()));
        let refresher = ScriptedRefresher::new(Duration::from_millis(50), false);
        let session = manager(store, refresher.clone());

        let (a, b) = tokio::join!(session.access_token(), session.force_refresh());
        assert_eq!(a.unwrap(), "access-1");
        assert_eq!(b.unwrap(), "access-1");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_is_shared_and_clears_store() {
        let store = Arc::new(MemoryTokenStore::with_tokens(expiring_tokens()));
        let refresher = ScriptedRefresher::new(Duration::from_millis(20), true);
        let session = manager(store.clone(), refresher.clone());

        let (a, b) = tokio::join!(session.access_token(), session.access_token());
        assert!(a.unwrap_err().is_session_expired());
        assert!(b.unwrap_err().is_session_expired());
        assert_eq!(refresher.calls(), 1);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_during_refresh_wins() {
        let store = Arc::new(MemoryTokenStore::with_tokens(expiring_tokens()));
        let refresher = ScriptedRefresher::new(Duration::from_millis(100), false);
        let session = manager(store.clone(), refresher.clone());

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.access_token().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.terminate().await.unwrap();

        assert!(waiter.await.unwrap().unwrap_err().is_session_expired());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_refresh_token_clears_without_network() {
        let now = Utc::now();
        let tokens = TokenSet::new(
            "a",
            "r",
            now - ChronoDuration::hours(2),
            now - ChronoDuration::hours(1),
            IssuingFlow::Password,
        );
        let store = Arc::new(MemoryTokenStore::with_tokens(tokens));
        let refresher = ScriptedRefresher::new(Duration::ZERO, false);
        let session = manager(store.clone(), refresher.clone());

        assert!(session.access_token().await.unwrap_err().is_session_expired());
        assert_eq!(refresher.calls(), 0);
        assert!(store.load().unwrap().is_none());
    }

    /// Store whose persisted data cannot be decoded until it is cleared.
    struct CorruptStore {
        cleared: std::sync::atomic::AtomicBool,
    }

    impl TokenStore for CorruptStore {
        fn load(&self) -> Result<Option<TokenSet>, AuthError> {
            if self.cleared.load(Ordering::SeqCst) {
                return Ok(None);
            }
            Err(AuthError::Serialization("expected a table".to_string()))
        }

        fn save(&self, _tokens: &TokenSet) -> Result<(), AuthError> {
            Ok(())
        }

        fn clear(&self) -> Result<(), AuthError> {
            self.cleared.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn unreadable_store_is_cleared_and_reported_expired() {
        let store = Arc::new(CorruptStore {
            cleared: std::sync::atomic::AtomicBool::new(false),
        });
        let refresher = ScriptedRefresher::new(Duration::ZERO, false);
        let session = SessionManager::builder()
            .store(store.clone())
            .refresher(refresher.clone())
            .build();

        let err = session.access_token().await.unwrap_err();
        assert!(err.is_session_expired(), "unexpected error: {err:?}");
        assert!(store.cleared.load(Ordering::SeqCst));
        assert_eq!(refresher.calls(), 0);
        assert!(session.access_token().await.unwrap_err().is_session_expired());
    }

    #[tokio::test]
    async fn establish_rejects_refresh_proof() {
        let refresher = ScriptedRefresher::new(Duration::ZERO, false);
        let session = manager(Arc::new(MemoryTokenStore::new()), refresher);
        let err = session
            .establish(Proof::refresh(&expiring_tokens()))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedProof(_)));
    }
}
