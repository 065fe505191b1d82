//! Configuration (layered: code > env > defaults).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;

use crate::auth::issuer::{GoogleIssuer, OtpIssuer, PasswordIssuer, RefreshIssuer, RevokeSignOut};
use crate::auth::{CredentialIssuer, TokenLifetimes, TokenStore, TokenStoreConfig};
use crate::error::SessionError;
use crate::executor::AuthenticatedClient;
use crate::session::{SessionManager, DEFAULT_ISSUER_TIMEOUT, DEFAULT_REFRESH_SKEW};

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_GOOGLE_REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Issuance endpoint paths, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPaths {
    pub login: String,
    pub google: String,
    pub verify_otp: String,
    pub refresh: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            google: "/auth/google".to_string(),
            verify_otp: "/auth/verify-otp".to_string(),
            refresh: "/auth/refresh".to_string(),
        }
    }
}

/// Settings for the session manager and its issuers.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use storefront_session::config::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .api_base_url("https://shop.example.com/api")
///     .issuer_timeout(Duration::from_secs(10))
///     .build();
/// assert_eq!(config.endpoint_url("/auth/refresh"), "https://shop.example.com/api/auth/refresh");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SessionConfig {
    #[builder(into, default = DEFAULT_API_BASE_URL.to_string())]
    pub api_base_url: String,
    #[builder(into, default = TokenStoreConfig::default_dir())]
    pub store_dir: PathBuf,
    #[builder(default = DEFAULT_REFRESH_SKEW)]
    pub refresh_skew: Duration,
    #[builder(default = DEFAULT_ISSUER_TIMEOUT)]
    pub issuer_timeout: Duration,
    #[builder(default)]
    pub lifetimes: TokenLifetimes,
    #[builder(default)]
    pub endpoints: EndpointPaths,
    #[builder(into, default = DEFAULT_GOOGLE_REVOKE_URL.to_string())]
    pub google_revoke_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SessionConfig {
    /// Load from environment variables, reading `.env` if present.
    ///
    /// Unparseable numeric values are a configuration error rather than being
    /// silently replaced by defaults.
    pub fn from_env() -> Result<Self, SessionError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();

        if let Ok(url) = std::env::var("STOREFRONT_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(dir) = std::env::var("STOREFRONT_SESSION_DIR") {
            config.store_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env_secs("STOREFRONT_REFRESH_SKEW_SECS")? {
            config.refresh_skew = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("STOREFRONT_ISSUER_TIMEOUT_SECS")? {
            config.issuer_timeout = Duration::from_secs(secs);
        }
        if let Ok(url) = std::env::var("STOREFRONT_GOOGLE_REVOKE_URL") {
            config.google_revoke_url = url;
        }
        Ok(config)
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// HTTP client for issuer calls, bounded by `issuer_timeout`.
    pub fn issuer_client(&self) -> Result<reqwest::Client, SessionError> {
        reqwest::Client::builder()
            .timeout(self.issuer_timeout)
            .build()
            .map_err(|e| SessionError::Configuration(format!("failed to build HTTP client: {e}")))
    }

    /// Wire a session manager with every sign-in flow and the refresher.
    pub fn build_manager(&self, store: Arc<dyn TokenStore>) -> Result<SessionManager, SessionError> {
        let client = self.issuer_client()?;
        let google = GoogleIssuer::new(client.clone())
            .with_exchange_url(self.endpoint_url(&self.endpoints.google))
            .with_lifetimes(self.lifetimes)
            .with_sign_out(Arc::new(
                RevokeSignOut::new(client.clone()).with_revoke_url(&self.google_revoke_url),
            ));
        let otp = OtpIssuer::new(client.clone())
            .with_verify_url(self.endpoint_url(&self.endpoints.verify_otp))
            .with_lifetimes(self.lifetimes);
        let password = PasswordIssuer::new(client.clone())
            .with_login_url(self.endpoint_url(&self.endpoints.login))
            .with_lifetimes(self.lifetimes);
        let refresher = RefreshIssuer::new(client)
            .with_refresh_url(self.endpoint_url(&self.endpoints.refresh))
            .with_lifetimes(self.lifetimes);

        let issuers: Vec<Arc<dyn CredentialIssuer>> =
            vec![Arc::new(google), Arc::new(otp), Arc::new(password)];

        Ok(SessionManager::builder()
            .store(store)
            .refresher(Arc::new(refresher))
            .issuers(issuers)
            .refresh_skew(self.refresh_skew)
            .issuer_timeout(self.issuer_timeout)
            .build())
    }

    /// Authenticated client for protected endpoints under `api_base_url`.
    pub fn build_client(&self, session: SessionManager) -> AuthenticatedClient {
        AuthenticatedClient::new(session).with_base_url(self.api_base_url.clone())
    }
}

fn env_secs(var: &str) -> Result<Option<u64>, SessionError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SessionError::Configuration(format!("{var} must be a whole number of seconds, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}
