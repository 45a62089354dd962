//! Socket transport
//!
//! A [`Connection`] is a pair of channels bridged to the socket by two
//! background tasks. Sessions only ever see frames, which keeps the state
//! machine independent of the WebSocket library and lets tests script a
//! server with plain channels.

use crate::error::GatewayError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Frame sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    /// Close the socket with this code
    Close(u16),
}

/// Frame received from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    /// Socket closed, with the close code if one was sent
    Closed { code: Option<u16>, reason: String },
    /// Socket failed without a close handshake
    Error(String),
}

/// An open gateway socket
#[derive(Debug)]
pub struct Connection {
    pub outgoing: mpsc::Sender<OutboundFrame>,
    pub incoming: mpsc::Receiver<InboundFrame>,
}

impl Connection {
    pub fn new(
        outgoing: mpsc::Sender<OutboundFrame>,
        incoming: mpsc::Receiver<InboundFrame>,
    ) -> Self {
        Self { outgoing, incoming }
    }
}

/// Opens gateway sockets
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, GatewayError>;
}

/// tokio-tungstenite backed connector
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

const OUTGOING_BUFFER: usize = 64;
const INCOMING_BUFFER: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Connection, GatewayError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(OUTGOING_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<InboundFrame>(INCOMING_BUFFER);

        // Writer: ends when the session drops its sender or asks to close
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    OutboundFrame::Close(code) => {
                        let frame = CloseFrame {
                            code: WsCloseCode::from(code),
                            reason: "".into(),
                        };
                        let handshake = async {
                            let _ = write.send(Message::Close(Some(frame))).await;
                            let _ = write.close().await;
                        };
                        if timeout(CLOSE_TIMEOUT, handshake).await.is_err() {
                            tracing::debug!(code, "Close handshake timed out");
                        }
                        return;
                    }
                }
            }
            let _ = timeout(CLOSE_TIMEOUT, write.close()).await;
        });

        // Reader: ends on close or error, or once the session drops its
        // receiver. Both halves must be gone for the socket to be released.
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    () = in_tx.closed() => return,
                    message = read.next() => message,
                };
                let Some(message) = message else { break };
                let frame = match message {
                    Ok(Message::Text(text)) => InboundFrame::Text(text),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => InboundFrame::Text(text),
                        Err(_) => {
                            tracing::warn!("Dropping non UTF-8 binary gateway frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame.map_or((None, String::new()), |f| {
                            (Some(u16::from(f.code)), f.reason.into_owned())
                        });
                        let _ = in_tx.send(InboundFrame::Closed { code, reason }).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = in_tx.send(InboundFrame::Error(e.to_string())).await;
                        return;
                    }
                };

                if in_tx.send(frame).await.is_err() {
                    return;
                }
            }

            let _ = in_tx
                .send(InboundFrame::Closed {
                    code: None,
                    reason: String::new(),
                })
                .await;
        });

        Ok(Connection::new(out_tx, in_rx))
    }
}
