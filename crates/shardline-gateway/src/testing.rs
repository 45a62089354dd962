//! Scripted gateway server for unit tests

use crate::error::GatewayError;
use crate::protocol::{GatewayMessage, OpCode};
use crate::transport::{Connection, Connector, InboundFrame, OutboundFrame};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Server side of one fake connection
pub(crate) struct ServerEnd {
    pub url: String,
    from_client: mpsc::Receiver<OutboundFrame>,
    to_client: mpsc::Sender<InboundFrame>,
}

impl ServerEnd {
    pub async fn send(&self, value: Value) {
        let _ = self.to_client.send(InboundFrame::Text(value.to_string())).await;
    }

    pub async fn hello(&self, interval_ms: u64) {
        self.send(json!({"op": 10, "d": {"heartbeat_interval": interval_ms}}))
            .await;
    }

    pub async fn ack(&self) {
        self.send(json!({"op": 11})).await;
    }

    pub async fn dispatch(&self, name: &str, seq: u64, data: Value) {
        self.send(json!({"op": 0, "s": seq, "t": name, "d": data}))
            .await;
    }

    pub async fn ready(&self, seq: u64, session_id: &str) {
        self.dispatch(
            "READY",
            seq,
            json!({
                "v": 10,
                "session_id": session_id,
                "resume_gateway_url": "wss://resume.test",
                "user": {"id": "1"}
            }),
        )
        .await;
    }

    pub async fn close(&self, code: u16) {
        let _ = self
            .to_client
            .send(InboundFrame::Closed {
                code: Some(code),
                reason: String::new(),
            })
            .await;
    }

    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.from_client.recv().await
    }

    /// Next frame, decoded; `Err` carries the close code
    pub async fn next_message(&mut self) -> Result<GatewayMessage, Option<u16>> {
        match self.recv().await {
            Some(OutboundFrame::Text(text)) => Ok(GatewayMessage::from_json(&text).unwrap()),
            Some(OutboundFrame::Close(code)) => Err(Some(code)),
            None => Err(None),
        }
    }

    /// Next message with the given opcode, skipping heartbeats
    pub async fn expect(&mut self, op: OpCode) -> GatewayMessage {
        loop {
            let message = self
                .next_message()
                .await
                .unwrap_or_else(|code| panic!("connection closed ({code:?}) waiting for {op}"));
            if message.op == OpCode::Heartbeat && op != OpCode::Heartbeat {
                continue;
            }
            assert_eq!(message.op, op);
            return message;
        }
    }
}

/// Connector that hands each new connection's server end to the test
pub(crate) struct ScriptedConnector {
    servers: mpsc::UnboundedSender<ServerEnd>,
}

pub(crate) fn scripted() -> (
    std::sync::Arc<ScriptedConnector>,
    mpsc::UnboundedReceiver<ServerEnd>,
) {
    let (servers, rx) = mpsc::unbounded_channel();
    (std::sync::Arc::new(ScriptedConnector { servers }), rx)
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, url: &str) -> Result<Connection, GatewayError> {
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);

        self.servers
            .send(ServerEnd {
                url: url.to_string(),
                from_client: out_rx,
                to_client: in_tx,
            })
            .map_err(|_| GatewayError::Transport("test server gone".to_string()))?;

        Ok(Connection::new(out_tx, in_rx))
    }
}
