//! Authenticated request execution with a single reactive retry.

mod request;

pub use request::{RequestBody, RequestSpec};

use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::session::SessionManager;

/// Sends requests with the session's bearer token attached.
///
/// On a 401 the session is refreshed and the request is sent exactly once
/// more. A second 401 ends the session. Any other status is returned to the
/// caller untouched.
///
/// # Example
/// ```no_run
/// use storefront_session::executor::AuthenticatedClient;
/// use storefront_session::session::SessionManager;
///
/// # async fn example(session: SessionManager) -> storefront_session::error::Result<()> {
/// let client = AuthenticatedClient::new(session).with_base_url("https://shop.example.com/api");
/// let orders = client.get("/orders").await?;
/// println!("{}", orders.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: reqwest::Client,
    session: SessionManager,
    base_url: Option<String>,
}

impl AuthenticatedClient {
    pub fn new(session: SessionManager) -> Self {
        Self {
            client: reqwest::Client::new(),
            session,
            base_url: None,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Send `spec` with the current access token.
    ///
    /// A 401 triggers a reactive refresh through
    /// [`SessionManager::refresh_rejected`]: if another request already
    /// replaced the rejected token, the replacement is reused without
    /// contacting the issuer; otherwise this joins or starts the single
    /// in-flight refresh. The request is then sent exactly once more.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Response> {
        let url = self.resolve_url(spec.url());
        let token = self.session.access_token().await?;

        let response = spec.to_request(&self.client, &url, &token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(method = %spec.method(), url = %url, "request rejected with 401; refreshing");
        let refreshed = self.session.refresh_rejected(&token).await?;

        let retried = spec.to_request(&self.client, &url, &refreshed).send().await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(method = %spec.method(), url = %url, "request rejected again after refresh");
            return Err(SessionError::Auth(self.session.expire_rejected(&refreshed)));
        }
        Ok(retried)
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.execute(&RequestSpec::get(path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        self.execute(&RequestSpec::post_json(path, body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.execute(&RequestSpec::delete(path)).await
    }

    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }
}
