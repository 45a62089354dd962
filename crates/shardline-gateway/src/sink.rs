//! Event sink
//!
//! Sessions hand every decoded dispatch to an [`EventSink`]. The sink is
//! awaited inline, so a slow sink applies backpressure to its shard.

use crate::events::GatewayEventType;
use crate::protocol::ShardId;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// One decoded DISPATCH frame
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub shard: ShardId,
    pub sequence: Option<u64>,
    /// Raw event name from the `t` field
    pub name: String,
    /// Known event type, `None` for names this build does not recognise
    pub kind: Option<GatewayEventType>,
    pub data: Value,
}

/// Receives dispatch events from every shard
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn on_dispatch(&self, event: DispatchEvent);
}

#[async_trait]
impl EventSink for mpsc::Sender<DispatchEvent> {
    async fn on_dispatch(&self, event: DispatchEvent) {
        if self.send(event).await.is_err() {
            tracing::debug!("Event receiver dropped, discarding dispatch");
        }
    }
}

#[async_trait]
impl EventSink for mpsc::UnboundedSender<DispatchEvent> {
    async fn on_dispatch(&self, event: DispatchEvent) {
        if self.send(event).is_err() {
            tracing::debug!("Event receiver dropped, discarding dispatch");
        }
    }
}
