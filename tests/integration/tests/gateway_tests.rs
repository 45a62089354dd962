//! Gateway integration tests over real WebSocket connections
//!
//! Run with: cargo test -p shardline-integration-tests --test gateway_tests

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Value};
use shardline::{
    Client, ClientConfig, DispatchEvent, GatewayEventType, Intents, SessionState, Token,
};
use shardline_integration_tests::{
    within, GatewayBehavior, MockApi, MockGateway, OP_IDENTIFY, OP_RESUME,
};
use tokio::sync::mpsc;

async fn setup(
    behavior: GatewayBehavior,
    shards: u32,
    max_concurrency: u32,
) -> (MockGateway, MockApi, Client) {
    let gateway = MockGateway::start(behavior)
        .await
        .expect("Failed to start mock gateway");
    let api = MockApi::start(&gateway.url, shards, max_concurrency)
        .await
        .expect("Failed to start mock API");
    let config = ClientConfig::new(Token::bot("test-token"))
        .with_api_base(api.base_url())
        .with_intents(Intents::GUILDS | Intents::GUILD_MESSAGES);
    let client = Client::new(config).expect("Failed to build client");
    (gateway, api, client)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<DispatchEvent>) -> DispatchEvent {
    within(rx.recv()).await.expect("event sink closed")
}

#[tokio::test]
async fn test_shards_identify_and_forward_dispatches() {
    let (mut gateway, api, client) = setup(GatewayBehavior::default(), 2, 2).await;
    let (tx, mut rx) = mpsc::unbounded_channel::<DispatchEvent>();

    let coordinator = within(client.connect(Arc::new(tx))).await.unwrap();
    assert_eq!(coordinator.shard_ids(), vec![0, 1]);
    assert_eq!(api.record.hits("/gateway/bot"), 1);

    let mut identified = BTreeSet::new();
    for _ in 0..2 {
        let (_, identify) = gateway.expect_op(OP_IDENTIFY).await;
        assert_eq!(identify["d"]["token"], "test-token");
        assert_eq!(
            identify["d"]["intents"],
            json!((Intents::GUILDS | Intents::GUILD_MESSAGES).bits())
        );
        identified.insert(identify["d"]["shard"].to_string());
    }
    assert_eq!(
        identified,
        BTreeSet::from(["[0,2]".to_string(), "[1,2]".to_string()])
    );

    let mut ready = 0;
    let mut messages = Vec::new();
    while ready < 2 || messages.len() < 2 {
        let event = next_event(&mut rx).await;
        match event.kind {
            Some(GatewayEventType::Ready) => ready += 1,
            Some(GatewayEventType::MessageCreate) => {
                assert_eq!(event.sequence, Some(2));
                assert_eq!(
                    event.data["content"],
                    Value::from(format!("hello from shard {}", event.shard.id))
                );
                messages.push(event.shard.id);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    messages.sort_unstable();
    assert_eq!(messages, vec![0, 1]);

    for shard_id in coordinator.shard_ids() {
        let mut snapshot = coordinator.subscribe(shard_id).unwrap();
        within(snapshot.wait_for(|s| s.state == SessionState::Ready && s.sequence == Some(2)))
            .await
            .unwrap();
        let current = coordinator.snapshot(shard_id).unwrap();
        assert_eq!(
            current.session_id,
            Some(format!("session-{shard_id}"))
        );
    }

    for (_, result) in within(coordinator.shutdown()).await {
        assert!(result.is_ok());
    }
    for _ in 0..2 {
        let (_, code) = gateway.expect_close().await;
        assert_eq!(code, Some(1000));
    }
    client.shutdown();
}

#[tokio::test]
async fn test_resumable_close_resumes_session() {
    let behavior = GatewayBehavior {
        close_first_connection_with: Some(4000),
        ..GatewayBehavior::default()
    };
    let (mut gateway, _api, client) = setup(behavior, 1, 1).await;
    let (tx, mut rx) = mpsc::unbounded_channel::<DispatchEvent>();

    let coordinator = within(client.connect(Arc::new(tx))).await.unwrap();

    let (connection, _) = gateway.expect_op(OP_IDENTIFY).await;
    assert_eq!(connection, 0);

    assert_eq!(next_event(&mut rx).await.kind, Some(GatewayEventType::Ready));
    assert_eq!(
        next_event(&mut rx).await.kind,
        Some(GatewayEventType::MessageCreate)
    );

    let (connection, resume) = gateway.expect_op(OP_RESUME).await;
    assert_eq!(connection, 1);
    assert_eq!(resume["d"]["session_id"], "session-0");
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["token"], "test-token");

    let resumed = next_event(&mut rx).await;
    assert_eq!(resumed.kind, Some(GatewayEventType::Resumed));
    assert_eq!(resumed.sequence, Some(3));

    let mut snapshot = coordinator.subscribe(0).unwrap();
    within(snapshot.wait_for(|s| s.state == SessionState::Ready && s.sequence == Some(3)))
        .await
        .unwrap();
    assert_eq!(
        coordinator.snapshot(0).unwrap().session_id.as_deref(),
        Some("session-0")
    );

    within(coordinator.shutdown()).await;
    client.shutdown();
}

#[tokio::test]
async fn test_bearer_token_is_refused_before_connecting() {
    let gateway = MockGateway::start(GatewayBehavior::default()).await.unwrap();
    let api = MockApi::start(&gateway.url, 1, 1).await.unwrap();
    let config = ClientConfig::new(Token::bearer("oauth")).with_api_base(api.base_url());
    let client = Client::new(config).unwrap();

    let (tx, _rx) = mpsc::unbounded_channel::<DispatchEvent>();
    let result = client.connect(Arc::new(tx)).await;

    assert!(matches!(
        result,
        Err(shardline::ClientError::Gateway(
            shardline_gateway::GatewayError::GatewayNotAllowed
        ))
    ));
    assert_eq!(api.record.hits("/gateway"), 0);
}
