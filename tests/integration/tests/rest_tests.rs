//! REST integration tests
//!
//! Run with: cargo test -p shardline-integration-tests --test rest_tests

use serde_json::{json, Value};
use shardline::{Client, ClientConfig, Method, Request, Route, Token};
use shardline_http::{RequestError, StatusCode};
use shardline_integration_tests::{within, MockApi};

async fn setup() -> (MockApi, Client) {
    let api = MockApi::start("ws://127.0.0.1:1/gateway", 1, 1)
        .await
        .expect("Failed to start mock API");
    let config = ClientConfig::new(Token::bot("test-token")).with_api_base(api.base_url());
    let client = Client::new(config).expect("Failed to build client");
    (api, client)
}

#[tokio::test]
async fn test_rate_limited_request_is_retried_transparently() {
    let (api, client) = setup().await;

    let future = client
        .rest()
        .submit_request(
            Method::POST,
            "/channels/{channel_id}/messages",
            &[("channel_id", "42")],
            Some(&json!({"content": "hello"})),
        )
        .unwrap();
    let response = within(future).await.unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let message: Value = response.json().unwrap();
    assert_eq!(message["channel_id"], "42");
    assert_eq!(message["content"], "hello");
    assert_eq!(api.record.hits("/channels/42/messages"), 2);

    let snapshots = client.rest().bucket_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].limit, Some(5));
    assert_eq!(snapshots[0].remaining, Some(4));
    assert_eq!(snapshots[0].bucket_id.as_deref(), Some("message-bucket"));

    client.shutdown();
}

#[tokio::test]
async fn test_request_headers() {
    let (api, client) = setup().await;

    let route = Route::post("/channels/{channel_id}/messages").param("channel_id", 7);
    let request = Request::new(&route)
        .unwrap()
        .json(&json!({"content": "audited"}))
        .unwrap()
        .reason("cleanup");
    within(client.rest().submit(request)).await.unwrap();

    assert_eq!(
        api.record.authorization.lock().as_deref(),
        Some("Bot test-token")
    );
    assert_eq!(api.record.audit_reason.lock().as_deref(), Some("cleanup"));
    assert!(api.record.user_agent.lock().is_some());
}

#[tokio::test]
async fn test_client_error_is_returned() {
    let (api, client) = setup().await;

    let future = client
        .rest()
        .submit_request::<()>(Method::GET, "/guilds/{guild_id}", &[("guild_id", "1")], None)
        .unwrap();
    let error = within(future).await.unwrap_err();

    assert!(matches!(error, RequestError::Http { .. }));
    assert_eq!(error.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(error.api_code(), Some(10004));
    assert_eq!(api.record.hits("/guilds/1"), 1);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let (api, client) = setup().await;

    let request = Request::new(&Route::get("/users/@me")).unwrap();
    let response = within(client.rest().submit(request)).await.unwrap();

    let user: Value = response.json().unwrap();
    assert_eq!(user["username"], "bot");
    assert_eq!(api.record.hits("/users/@me"), 2);
}

#[tokio::test]
async fn test_fetch_gateway_descriptor() {
    let (api, client) = setup().await;

    let descriptor = within(client.fetch_gateway()).await.unwrap();
    assert_eq!(descriptor.url, "ws://127.0.0.1:1/gateway");
    assert_eq!(descriptor.shards, 1);
    assert_eq!(descriptor.session_start_limit.remaining, 1000);
    assert_eq!(api.record.hits("/gateway/bot"), 1);

    let user_client = Client::new(
        ClientConfig::new(Token::parse("user.token").unwrap()).with_api_base(api.base_url()),
    )
    .unwrap();
    within(user_client.fetch_gateway()).await.unwrap();
    assert_eq!(api.record.hits("/gateway"), 1);
}

#[tokio::test]
async fn test_shutdown_rejects_new_requests() {
    let (_api, client) = setup().await;
    client.shutdown();

    let request = Request::new(&Route::get("/users/@me")).unwrap();
    let result = within(client.rest().submit(request)).await;
    assert!(matches!(result, Err(RequestError::ShuttingDown)));
}
