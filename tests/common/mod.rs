#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use storefront_session::auth::{IssuingFlow, TokenSet, TokenStore};
use storefront_session::config::SessionConfig;
use storefront_session::executor::AuthenticatedClient;
use storefront_session::session::SessionManager;
use wiremock::MockServer;

/// Session whose access token expires in `access_in` and refresh token in
/// `refresh_in`.
pub fn tokens(access: &str, access_in: Duration, refresh_in: Duration) -> TokenSet {
    let now = Utc::now();
    TokenSet::new(
        access,
        format!("{access}-refresh"),
        now + access_in,
        now + refresh_in,
        IssuingFlow::Password,
    )
}

pub fn fresh_tokens(access: &str) -> TokenSet {
    tokens(access, Duration::hours(4), Duration::days(30))
}

/// Access token inside the default five-minute refresh window.
pub fn expiring_tokens(access: &str) -> TokenSet {
    tokens(access, Duration::minutes(2), Duration::days(30))
}

pub fn issued_body(access: &str, refresh: &str) -> Value {
    json!({
        "success": true,
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 4 * 60 * 60,
        "user": { "id": 42, "name": "Ada" }
    })
}

pub fn config_for(server: &MockServer) -> SessionConfig {
    SessionConfig::builder()
        .api_base_url(format!("{}/api", server.uri()))
        .google_revoke_url(format!("{}/revoke", server.uri()))
        .issuer_timeout(StdDuration::from_secs(2))
        .build()
}

pub fn manager_for(server: &MockServer, store: Arc<dyn TokenStore>) -> SessionManager {
    config_for(server)
        .build_manager(store)
        .expect("session manager")
}

pub fn client_for(server: &MockServer, store: Arc<dyn TokenStore>) -> AuthenticatedClient {
    let config = config_for(server);
    let session = config.build_manager(store).expect("session manager");
    config.build_client(session)
}
