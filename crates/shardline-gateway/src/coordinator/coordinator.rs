//! Session coordinator
//!
//! Owns every shard's session task, keyed by shard id. Sessions never hold a
//! reference back to the coordinator; they share only the [`IdentifyQueue`]
//! handle and a shutdown signal.

use super::descriptor::GatewayDescriptor;
use super::identify::IdentifyQueue;
use crate::error::GatewayError;
use crate::protocol::{IdentifyProperties, ShardId};
use crate::session::{GatewaySession, SessionSettings, SessionSnapshot};
use crate::sink::EventSink;
use crate::transport::Connector;
use shardline_core::{Intents, Token};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Settings shared by every shard
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub token: Token,
    pub intents: Intents,
    /// Total shard count; `None` uses the descriptor's recommendation
    pub shard_count: Option<u32>,
    /// Run only these shards; `None` runs all of them
    pub shard_ids: Option<Vec<u32>>,
    pub version: u8,
    pub large_threshold: Option<u8>,
    pub identify_spacing: Duration,
    pub hello_timeout: Duration,
    pub properties: IdentifyProperties,
}

impl CoordinatorSettings {
    pub fn new(token: Token) -> Self {
        Self {
            token,
            intents: Intents::default(),
            shard_count: None,
            shard_ids: None,
            version: 10,
            large_threshold: None,
            identify_spacing: Duration::from_secs(5),
            hello_timeout: Duration::from_secs(30),
            properties: IdentifyProperties::default(),
        }
    }
}

struct SessionHandle {
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<Result<(), GatewayError>>,
}

/// Supervises the gateway sessions of every shard
pub struct SessionCoordinator {
    shard_count: u32,
    identify: Arc<IdentifyQueue>,
    sessions: BTreeMap<u32, SessionHandle>,
    shutdown: watch::Sender<bool>,
}

impl SessionCoordinator {
    /// Validate the shard layout and spawn one session per shard
    ///
    /// Fails before spawning anything if a shard id is out of range or the
    /// session start budget cannot cover every shard.
    pub fn start(
        settings: CoordinatorSettings,
        descriptor: &GatewayDescriptor,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, GatewayError> {
        if !settings.token.can_connect_gateway() {
            return Err(GatewayError::GatewayNotAllowed);
        }

        let shard_count = settings.shard_count.unwrap_or(descriptor.shards).max(1);
        let shards = match &settings.shard_ids {
            Some(ids) => {
                let mut ids = ids.clone();
                ids.sort_unstable();
                ids.dedup();
                ids.into_iter()
                    .map(|id| {
                        ShardId::new(id, shard_count).ok_or(GatewayError::InvalidShard {
                            shard_id: id,
                            shard_count,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => (0..shard_count)
                .map(|id| ShardId { id, total: shard_count })
                .collect(),
        };

        let limit = descriptor.session_start_limit;
        if (limit.remaining as usize) < shards.len() {
            tracing::error!(
                shards = shards.len(),
                remaining = limit.remaining,
                reset_after_ms = limit.reset_after,
                "Not enough session starts left to start every shard"
            );
            return Err(GatewayError::SessionStartLimitExhausted {
                reset_after: limit.reset_after(),
            });
        }

        let identify = Arc::new(IdentifyQueue::new(&limit, settings.identify_spacing));
        let (shutdown, _) = watch::channel(false);

        tracing::info!(
            shards = shards.len(),
            shard_count,
            max_concurrency = identify.max_concurrency(),
            remaining_starts = limit.remaining,
            "Starting gateway sessions"
        );

        let mut sessions = BTreeMap::new();
        for shard in shards {
            let session_settings = SessionSettings {
                token: settings.token.clone(),
                intents: settings.intents,
                shard,
                gateway_url: descriptor.url.clone(),
                version: settings.version,
                large_threshold: settings.large_threshold,
                hello_timeout: settings.hello_timeout,
                properties: settings.properties.clone(),
            };
            let session = GatewaySession::new(
                session_settings,
                Arc::clone(&connector),
                Arc::clone(&identify),
                Arc::clone(&sink),
                shutdown.subscribe(),
            );
            let snapshot = session.subscribe();
            let task = tokio::spawn(session.run());
            sessions.insert(shard.id, SessionHandle { snapshot, task });
        }

        Ok(Self {
            shard_count,
            identify,
            sessions,
            shutdown,
        })
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Ids of the shards run by this coordinator, ascending
    pub fn shard_ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    pub fn max_concurrency(&self) -> u32 {
        self.identify.max_concurrency()
    }

    pub fn remaining_session_starts(&self) -> u32 {
        self.identify.remaining_starts()
    }

    pub fn snapshot(&self, shard_id: u32) -> Option<SessionSnapshot> {
        self.sessions
            .get(&shard_id)
            .map(|handle| handle.snapshot.borrow().clone())
    }

    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .values()
            .map(|handle| handle.snapshot.borrow().clone())
            .collect()
    }

    /// Watch one shard's state
    pub fn subscribe(&self, shard_id: u32) -> Option<watch::Receiver<SessionSnapshot>> {
        self.sessions
            .get(&shard_id)
            .map(|handle| handle.snapshot.clone())
    }

    /// Mean heartbeat latency across shards that have one
    pub fn average_latency(&self) -> Option<Duration> {
        let latencies: Vec<Duration> = self
            .sessions
            .values()
            .filter_map(|handle| handle.snapshot.borrow().latency)
            .collect();
        let count = u32::try_from(latencies.len()).ok().filter(|n| *n > 0)?;
        Some(latencies.iter().sum::<Duration>() / count)
    }

    /// True once every session has ended
    pub fn is_finished(&self) -> bool {
        self.sessions.values().all(|handle| handle.task.is_finished())
    }

    /// Wait for every session to end on its own
    pub async fn join(self) -> Vec<(u32, Result<(), GatewayError>)> {
        let Self {
            sessions, shutdown, ..
        } = self;

        let mut results = Vec::with_capacity(sessions.len());
        for (shard_id, handle) in sessions {
            let result = handle
                .task
                .await
                .unwrap_or_else(|e| Err(GatewayError::TaskFailed(e.to_string())));
            results.push((shard_id, result));
        }

        drop(shutdown);
        results
    }

    /// Close every session and wait for them to finish
    pub async fn shutdown(self) -> Vec<(u32, Result<(), GatewayError>)> {
        tracing::info!(shards = self.sessions.len(), "Shutting down gateway sessions");
        self.shutdown.send_replace(true);
        self.join().await
    }
}
