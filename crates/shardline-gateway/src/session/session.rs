//! Gateway session
//!
//! One shard's connection loop: handshake, heartbeats, dispatch forwarding,
//! and reconnect/resume. Every socket gets a fresh `drive` call; the timers
//! and pending identify live inside it, so replacing the socket tears them
//! all down together.

use super::heartbeat::Heartbeater;
use super::state::{AuthMode, SessionSnapshot, SessionState};
use crate::coordinator::{IdentifyPermit, IdentifyQueue};
use crate::error::GatewayError;
use crate::events::GatewayEventType;
use crate::protocol::{
    CloseDisposition, GatewayMessage, HelloPayload, IdentifyPayload, IdentifyProperties, OpCode,
    ReadyPayload, ResumePayload, ShardId,
};
use crate::sink::{DispatchEvent, EventSink};
use crate::transport::{Connection, Connector, InboundFrame, OutboundFrame};
use rand::Rng;
use serde::Deserialize;
use serde_json::Value;
use shardline_core::{Intents, Token};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, sleep_until, Instant};

/// Client close code that keeps the session resumable
const RESUMABLE_CLOSE: u16 = 4000;
/// Client close code that ends the session server side
const NORMAL_CLOSE: u16 = 1000;
/// Reconnects started within this window of the previous attempt back off
const RECONNECT_WINDOW: Duration = Duration::from_secs(5);

type PermitFuture = Pin<Box<dyn Future<Output = Result<IdentifyPermit, GatewayError>> + Send>>;

/// Static configuration of one session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub token: Token,
    pub intents: Intents,
    pub shard: ShardId,
    /// Bootstrap URL used for fresh identifies
    pub gateway_url: String,
    pub version: u8,
    pub large_threshold: Option<u8>,
    pub hello_timeout: Duration,
    pub properties: IdentifyProperties,
}

impl SessionSettings {
    pub fn new(token: Token, shard: ShardId, gateway_url: impl Into<String>) -> Self {
        Self {
            token,
            intents: Intents::default(),
            shard,
            gateway_url: gateway_url.into(),
            version: 10,
            large_threshold: None,
            hello_timeout: Duration::from_secs(30),
            properties: IdentifyProperties::default(),
        }
    }
}

/// Append the protocol version and encoding to a gateway URL
pub(crate) fn connect_url(base: &str, version: u8) -> String {
    let base = base.trim_end_matches('/');
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}v={version}&encoding=json")
}

fn invalid_session_delay() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(1_000..=5_000))
}

/// Completes when shutdown is signalled; never completes if the sender was
/// dropped without signalling
async fn shutdown_signalled(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|closing| *closing).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn await_permit(pending: &mut Option<PermitFuture>) -> Result<IdentifyPermit, GatewayError> {
    match pending {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

/// How one connection ended
enum Outcome {
    Shutdown,
    Fatal(GatewayError),
    Reconnect { delay: Option<Duration> },
}

enum Flow {
    Continue,
    Exit(Outcome),
}

impl Flow {
    fn reconnect() -> Self {
        Self::Exit(Outcome::Reconnect { delay: None })
    }
}

/// One shard's gateway connection
pub struct GatewaySession {
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    identify: Arc<IdentifyQueue>,
    sink: Arc<dyn EventSink>,
    shutdown: watch::Receiver<bool>,
    snapshot: watch::Sender<SessionSnapshot>,

    state: SessionState,
    sequence: Option<u64>,
    session_id: Option<String>,
    resume_url: Option<String>,
    /// The last connection ended in a way that allows Resume
    resumable: bool,
    heartbeat: Heartbeater,
    /// Held from identify until READY
    permit: Option<IdentifyPermit>,
    attempts: u32,
    last_attempt: Option<Instant>,
}

impl GatewaySession {
    pub fn new(
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
        identify: Arc<IdentifyQueue>,
        sink: Arc<dyn EventSink>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::new(settings.shard));
        Self {
            settings,
            connector,
            identify,
            sink,
            shutdown,
            snapshot,
            state: SessionState::Disconnected,
            sequence: None,
            session_id: None,
            resume_url: None,
            resumable: false,
            heartbeat: Heartbeater::new(),
            permit: None,
            attempts: 0,
            last_attempt: None,
        }
    }

    /// Watch this session's state
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn shard(&self) -> ShardId {
        self.settings.shard
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Run until shutdown or a fatal error
    ///
    /// Transient failures reconnect, resuming when a session exists.
    pub async fn run(mut self) -> Result<(), GatewayError> {
        if !self.settings.token.can_connect_gateway() {
            self.set_state(SessionState::Closed);
            return Err(GatewayError::GatewayNotAllowed);
        }

        let result = loop {
            if *self.shutdown.borrow() {
                break Ok(());
            }

            let backoff = self.reconnect_backoff();
            if !backoff.is_zero() {
                tracing::debug!(
                    shard = %self.settings.shard,
                    attempts = self.attempts,
                    delay_ms = backoff.as_millis() as u64,
                    "Backing off before reconnect"
                );
                if !self.pause(backoff).await {
                    break Ok(());
                }
            }

            match self.connect_once().await {
                Outcome::Shutdown => break Ok(()),
                Outcome::Fatal(err) => {
                    tracing::error!(shard = %self.settings.shard, error = %err, "Gateway session failed");
                    break Err(err);
                }
                Outcome::Reconnect { delay } => {
                    self.set_state(SessionState::Reconnecting);
                    if let Some(delay) = delay {
                        if !self.pause(delay).await {
                            break Ok(());
                        }
                    }
                }
            }
        };

        self.set_state(SessionState::Closed);
        tracing::info!(shard = %self.settings.shard, "Gateway session closed");
        result
    }

    /// Sleep unless shutdown arrives first; false on shutdown
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            () = shutdown_signalled(self.shutdown.clone()) => false,
            () = sleep(delay) => true,
        }
    }

    fn reconnect_backoff(&mut self) -> Duration {
        let now = Instant::now();
        let delay = match self.last_attempt {
            Some(last) if now.saturating_duration_since(last) < RECONNECT_WINDOW => {
                self.attempts += 1;
                Duration::from_secs_f64(1.0 + rand::random::<f64>() * f64::from(self.attempts))
            }
            _ => {
                self.attempts = 0;
                Duration::ZERO
            }
        };
        self.last_attempt = Some(now + delay);
        delay
    }

    fn can_resume(&self) -> bool {
        self.resumable && self.session_id.is_some()
    }

    fn reset_session(&mut self) {
        self.session_id = None;
        self.sequence = None;
        self.resume_url = None;
        self.resumable = false;
    }

    async fn connect_once(&mut self) -> Outcome {
        let resuming = self.can_resume();
        let base = match (&self.resume_url, resuming) {
            (Some(url), true) => url.clone(),
            _ => self.settings.gateway_url.clone(),
        };
        let url = connect_url(&base, self.settings.version);

        self.set_state(SessionState::Connecting);
        tracing::info!(shard = %self.settings.shard, resume = resuming, "Connecting to gateway");

        let connection = tokio::select! {
            biased;
            () = shutdown_signalled(self.shutdown.clone()) => return Outcome::Shutdown,
            result = self.connector.connect(&url) => result,
        };

        let outcome = match connection {
            Ok(connection) => {
                self.set_state(SessionState::AwaitingHello);
                self.drive(connection).await
            }
            Err(err) => {
                tracing::warn!(shard = %self.settings.shard, error = %err, "Gateway connection failed");
                Outcome::Reconnect { delay: None }
            }
        };

        self.heartbeat.stop();
        self.permit = None;
        outcome
    }

    async fn drive(&mut self, connection: Connection) -> Outcome {
        let Connection {
            outgoing,
            mut incoming,
        } = connection;
        let hello_deadline = Instant::now() + self.settings.hello_timeout;
        let mut pending_identify: Option<PermitFuture> = None;

        loop {
            let next_beat = self.heartbeat.next_beat();
            let awaiting_hello = self.state == SessionState::AwaitingHello;

            tokio::select! {
                biased;
                () = shutdown_signalled(self.shutdown.clone()) => {
                    tracing::info!(shard = %self.settings.shard, "Closing gateway connection");
                    let _ = outgoing.send(OutboundFrame::Close(NORMAL_CLOSE)).await;
                    return Outcome::Shutdown;
                }
                frame = incoming.recv() => {
                    let flow = match frame {
                        Some(InboundFrame::Text(text)) => {
                            self.handle_text(&text, &outgoing, &mut pending_identify).await
                        }
                        Some(InboundFrame::Closed { code, reason }) => {
                            Flow::Exit(self.on_close(code, &reason))
                        }
                        Some(InboundFrame::Error(error)) => {
                            tracing::warn!(shard = %self.settings.shard, error = %error, "Gateway socket error");
                            Flow::reconnect()
                        }
                        None => {
                            tracing::warn!(shard = %self.settings.shard, "Gateway socket dropped");
                            Flow::reconnect()
                        }
                    };
                    if let Flow::Exit(outcome) = flow {
                        return outcome;
                    }
                }
                () = sleep_until_some(next_beat) => {
                    if let Flow::Exit(outcome) = self.beat(&outgoing).await {
                        return outcome;
                    }
                }
                () = sleep_until(hello_deadline), if awaiting_hello => {
                    tracing::warn!(
                        shard = %self.settings.shard,
                        timeout_ms = self.settings.hello_timeout.as_millis() as u64,
                        "Timed out waiting for HELLO"
                    );
                    let _ = outgoing.send(OutboundFrame::Close(RESUMABLE_CLOSE)).await;
                    return Outcome::Reconnect { delay: None };
                }
                permit = await_permit(&mut pending_identify) => {
                    pending_identify = None;
                    let flow = match permit {
                        Ok(permit) => self.send_identify(permit, &outgoing).await,
                        Err(err) => {
                            let _ = outgoing.send(OutboundFrame::Close(NORMAL_CLOSE)).await;
                            Flow::Exit(Outcome::Fatal(err))
                        }
                    };
                    if let Flow::Exit(outcome) = flow {
                        return outcome;
                    }
                }
            }
        }
    }

    async fn handle_text(
        &mut self,
        text: &str,
        outgoing: &mpsc::Sender<OutboundFrame>,
        pending_identify: &mut Option<PermitFuture>,
    ) -> Flow {
        let message = match GatewayMessage::from_json(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(shard = %self.settings.shard, error = %err, "Failed to decode gateway frame");
                return Flow::Continue;
            }
        };

        match message.op {
            OpCode::Hello => self.on_hello(&message, outgoing, pending_identify).await,
            OpCode::Dispatch => {
                self.on_dispatch(message).await;
                Flow::Continue
            }
            OpCode::Heartbeat => {
                if self.heartbeat.awaiting_ack() {
                    tracing::debug!(
                        shard = %self.settings.shard,
                        "Heartbeat requested while one is outstanding"
                    );
                    Flow::Continue
                } else {
                    self.send_heartbeat(outgoing, false).await
                }
            }
            OpCode::HeartbeatAck => {
                self.heartbeat.acked();
                tracing::trace!(
                    shard = %self.settings.shard,
                    latency_ms = self.heartbeat.latency().map(|l| l.as_millis() as u64),
                    "Heartbeat acknowledged"
                );
                self.publish();
                Flow::Continue
            }
            OpCode::Reconnect => {
                tracing::info!(shard = %self.settings.shard, "Gateway requested reconnect");
                self.resumable = true;
                let _ = outgoing.send(OutboundFrame::Close(RESUMABLE_CLOSE)).await;
                Flow::reconnect()
            }
            OpCode::InvalidSession => {
                let resumable = message.invalid_session_resumable().unwrap_or(false);
                tracing::warn!(shard = %self.settings.shard, resumable, "Session invalidated");
                if resumable {
                    self.resumable = true;
                } else {
                    self.reset_session();
                    self.publish();
                }
                let _ = outgoing.send(OutboundFrame::Close(RESUMABLE_CLOSE)).await;
                Flow::Exit(Outcome::Reconnect {
                    delay: Some(invalid_session_delay()),
                })
            }
            other => {
                tracing::debug!(shard = %self.settings.shard, op = %other, "Ignoring unexpected opcode");
                Flow::Continue
            }
        }
    }

    async fn on_hello(
        &mut self,
        message: &GatewayMessage,
        outgoing: &mpsc::Sender<OutboundFrame>,
        pending_identify: &mut Option<PermitFuture>,
    ) -> Flow {
        if self.state != SessionState::AwaitingHello {
            tracing::debug!(shard = %self.settings.shard, "Ignoring repeated HELLO");
            return Flow::Continue;
        }

        let interval = message
            .data::<HelloPayload>()
            .map(|hello| hello.heartbeat_interval)
            .unwrap_or_default();
        if interval == 0 {
            tracing::warn!(shard = %self.settings.shard, "HELLO carried no heartbeat interval");
            let _ = outgoing.send(OutboundFrame::Close(RESUMABLE_CLOSE)).await;
            return Flow::reconnect();
        }

        self.heartbeat.start(Duration::from_millis(interval));
        tracing::debug!(shard = %self.settings.shard, interval_ms = interval, "Received HELLO");

        if self.can_resume() {
            self.send_resume(outgoing).await
        } else {
            self.set_state(SessionState::Authenticating(AuthMode::Identify));
            let identify = Arc::clone(&self.identify);
            let shard = self.settings.shard;
            *pending_identify = Some(Box::pin(async move { identify.acquire(shard).await }));
            Flow::Continue
        }
    }

    async fn send_resume(&mut self, outgoing: &mpsc::Sender<OutboundFrame>) -> Flow {
        let Some(session_id) = self.session_id.clone() else {
            return Flow::reconnect();
        };

        self.set_state(SessionState::Authenticating(AuthMode::Resume));
        tracing::info!(
            shard = %self.settings.shard,
            session_id = %session_id,
            sequence = ?self.sequence,
            "Resuming session"
        );

        let payload = ResumePayload {
            token: self.settings.token.secret().to_string(),
            session_id,
            seq: self.sequence,
        };
        match GatewayMessage::resume(&payload) {
            Ok(message) => self.send(outgoing, &message).await,
            Err(err) => Flow::Exit(Outcome::Fatal(err.into())),
        }
    }

    async fn send_identify(
        &mut self,
        permit: IdentifyPermit,
        outgoing: &mpsc::Sender<OutboundFrame>,
    ) -> Flow {
        self.reset_session();
        self.permit = Some(permit);
        self.publish();

        tracing::info!(
            shard = %self.settings.shard,
            intents = self.settings.intents.bits(),
            "Identifying"
        );

        let payload = IdentifyPayload {
            token: self.settings.token.secret().to_string(),
            properties: self.settings.properties.clone(),
            intents: self.settings.intents,
            shard: self.settings.shard,
            large_threshold: self.settings.large_threshold,
        };
        match GatewayMessage::identify(&payload) {
            Ok(message) => self.send(outgoing, &message).await,
            Err(err) => Flow::Exit(Outcome::Fatal(err.into())),
        }
    }

    /// Scheduled heartbeat, or zombie detection if the last one went unanswered
    async fn beat(&mut self, outgoing: &mpsc::Sender<OutboundFrame>) -> Flow {
        if self.heartbeat.awaiting_ack() {
            tracing::warn!(
                shard = %self.settings.shard,
                "Heartbeat not acknowledged, reconnecting zombie connection"
            );
            self.resumable = true;
            let _ = outgoing.send(OutboundFrame::Close(RESUMABLE_CLOSE)).await;
            return Flow::reconnect();
        }

        self.send_heartbeat(outgoing, true).await
    }

    async fn send_heartbeat(&mut self, outgoing: &mpsc::Sender<OutboundFrame>, scheduled: bool) -> Flow {
        let flow = self
            .send(outgoing, &GatewayMessage::heartbeat(self.sequence))
            .await;
        if matches!(flow, Flow::Continue) {
            self.heartbeat.sent(scheduled);
            tracing::trace!(shard = %self.settings.shard, scheduled, sequence = ?self.sequence, "Sent heartbeat");
        }
        flow
    }

    async fn send(&self, outgoing: &mpsc::Sender<OutboundFrame>, message: &GatewayMessage) -> Flow {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(err) => return Flow::Exit(Outcome::Fatal(err.into())),
        };

        if outgoing.send(OutboundFrame::Text(text)).await.is_err() {
            tracing::warn!(shard = %self.settings.shard, op = %message.op, "Gateway writer closed");
            return Flow::reconnect();
        }
        Flow::Continue
    }

    async fn on_dispatch(&mut self, message: GatewayMessage) {
        if let Some(sequence) = message.s {
            self.record_sequence(sequence);
        }

        let name = message.t.unwrap_or_default();
        let kind = GatewayEventType::from_name(&name);

        match kind {
            Some(GatewayEventType::Ready) => self.on_ready(&message.d),
            Some(GatewayEventType::Resumed) => {
                tracing::info!(shard = %self.settings.shard, sequence = ?self.sequence, "Session resumed");
                self.attempts = 0;
                self.set_state(SessionState::Ready);
            }
            _ => self.publish(),
        }

        self.sink
            .on_dispatch(DispatchEvent {
                shard: self.settings.shard,
                sequence: message.s,
                name,
                kind,
                data: message.d,
            })
            .await;
    }

    fn on_ready(&mut self, data: &Value) {
        match ReadyPayload::deserialize(data) {
            Ok(ready) => {
                self.session_id = Some(ready.session_id);
                self.resume_url = ready.resume_gateway_url;
            }
            Err(err) => {
                tracing::warn!(shard = %self.settings.shard, error = %err, "READY carried no usable session id");
            }
        }

        self.resumable = true;
        self.attempts = 0;
        // Frees the identify group for the next shard
        self.permit = None;
        self.set_state(SessionState::Ready);

        tracing::info!(
            shard = %self.settings.shard,
            session_id = ?self.session_id,
            "Session ready"
        );
    }

    /// Sequence numbers only move forward within a session
    fn record_sequence(&mut self, sequence: u64) {
        match self.sequence {
            Some(current) if sequence < current => {
                tracing::warn!(
                    shard = %self.settings.shard,
                    current,
                    received = sequence,
                    "Ignoring out of order sequence"
                );
            }
            _ => self.sequence = Some(sequence),
        }
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) -> Outcome {
        match CloseDisposition::classify(code) {
            CloseDisposition::Fatal => {
                let code = code.unwrap_or_default();
                tracing::error!(
                    shard = %self.settings.shard,
                    close_code = code,
                    reason,
                    "Gateway closed the session, not reconnecting"
                );
                Outcome::Fatal(GatewayError::FatalClose {
                    code,
                    reason: reason.to_string(),
                })
            }
            CloseDisposition::Reidentify => {
                tracing::warn!(
                    shard = %self.settings.shard,
                    close_code = ?code,
                    reason,
                    "Gateway closed, session must be re-identified"
                );
                self.reset_session();
                self.publish();
                Outcome::Reconnect { delay: None }
            }
            CloseDisposition::Resume => {
                tracing::info!(
                    shard = %self.settings.shard,
                    close_code = ?code,
                    reason,
                    "Gateway closed, reconnecting"
                );
                self.resumable = true;
                Outcome::Reconnect { delay: None }
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!(shard = %self.settings.shard, from = %self.state, to = %state, "Session state changed");
            self.state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            shard: self.settings.shard,
            state: self.state,
            sequence: self.sequence,
            session_id: self.session_id.clone(),
            latency: self.heartbeat.latency(),
        });
    }
}
