mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use pretty_assertions::assert_eq;
use serde_json::json;
use storefront_session::auth::{AuthError, MemoryTokenStore, TokenStore};
use storefront_session::error::{ErrorCategory, RecoverySuggestion, SessionError};
use storefront_session::executor::RequestSpec;
use reqwest::header::HeaderValue;
use reqwest::Method;
use wiremock::matchers::{body_bytes, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client_for, fresh_tokens, issued_body};

async fn mount_refresh(server: &MockServer, access: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issued_body(access, "next-refresh")))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_orders(server: &MockServer, token: &str, status: u16, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "orders": [] })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn attaches_bearer_token() {
    let server = MockServer::start().await;
    mount_orders(&server, "current", 200, 1).await;
    mount_refresh(&server, "unused", 0).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("current")));
    let client = client_for(&server, store);

    let response = client.get("/orders").await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    mount_orders(&server, "revoked", 401, 1).await;
    mount_orders(&server, "renewed", 200, 1).await;
    mount_refresh(&server, "renewed", 1).await;

    // Locally valid, but the server has revoked it.
    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store.clone());

    let response = client.get("/orders").await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(store.load().unwrap().unwrap().access_token(), "renewed");
}

#[tokio::test]
async fn second_unauthorized_ends_the_session() {
    let server = MockServer::start().await;
    mount_orders(&server, "revoked", 401, 1).await;
    mount_orders(&server, "renewed", 401, 1).await;
    mount_refresh(&server, "renewed", 1).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store.clone());

    let err = client.get("/orders").await.unwrap_err();
    assert!(err.is_session_expired(), "unexpected error: {err:?}");
    assert_eq!(err.category(), ErrorCategory::SessionExpired);
    assert_eq!(err.recovery_suggestion(), RecoverySuggestion::SignInAgain);
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn non_auth_failures_are_returned_as_is() {
    let server = MockServer::start().await;
    mount_orders(&server, "current", 500, 1).await;
    Mock::given(method("DELETE"))
        .and(path("/api/orders/7"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "unused", 0).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("current")));
    let client = client_for(&server, store.clone());

    assert_eq!(client.get("/orders").await.unwrap().status(), 500);
    assert_eq!(client.delete("/orders/7").await.unwrap().status(), 403);
    assert_eq!(store.load().unwrap().unwrap().access_token(), "current");
}

#[tokio::test]
async fn signed_out_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryTokenStore::new()));
    let err = client.get("/orders").await.unwrap_err();
    assert!(matches!(err, SessionError::Auth(AuthError::SessionExpired(_))));
}

#[tokio::test]
async fn failed_refresh_after_unauthorized_ends_the_session() {
    let server = MockServer::start().await;
    mount_orders(&server, "revoked", 401, 1).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "expired" })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store.clone());

    let err = client.get("/orders").await.unwrap_err();
    assert!(err.is_session_expired());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn retry_replays_body_and_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart/items"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart/items"))
        .and(header("authorization", "Bearer renewed"))
        .and(query_param("source", "app"))
        .and(body_json(json!({ "sku": "A-1", "qty": 2 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "renewed", 1).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store);

    let spec = RequestSpec::post_json("/cart/items", &json!({ "sku": "A-1", "qty": 2 }))
        .unwrap()
        .query("source", "app");
    assert_eq!(client.execute(&spec).await.unwrap().status(), 201);
}

#[tokio::test]
async fn retry_replays_put_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/profile"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/profile"))
        .and(header("authorization", "Bearer renewed"))
        .and(body_json(json!({ "name": "Ada Lovelace" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "renewed", 1).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store);

    let spec = RequestSpec::put_json("/profile", &json!({ "name": "Ada Lovelace" })).unwrap();
    assert_eq!(client.execute(&spec).await.unwrap().status(), 200);
}

#[tokio::test]
async fn retry_replays_bytes_body_with_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/profile/avatar"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/profile/avatar"))
        .and(header("authorization", "Bearer renewed"))
        .and(header("content-type", "image/png"))
        .and(body_bytes(vec![0x89, b'P', b'N', b'G']))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, "renewed", 1).await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store);

    let spec = RequestSpec::bytes(
        Method::PUT,
        "/profile/avatar",
        HeaderValue::from_static("image/png"),
        vec![0x89, b'P', b'N', b'G'],
    );
    assert_eq!(client.execute(&spec).await.unwrap().status(), 204);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer revoked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .and(header("authorization", "Bearer renewed"))
        .respond_with(ResponseTemplate::new(200))
        .expect(8)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(issued_body("renewed", "next-refresh"))
                .set_delay(StdDuration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_tokens(fresh_tokens("revoked")));
    let client = client_for(&server, store);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.get("/orders").await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status(), 200);
    }
}
