//! # shardline
//!
//! Gateway and REST client core.
//!
//! [`Client`] owns the rate-limited [`RequestScheduler`] and starts gateway
//! sessions for every configured shard:
//!
//! ```no_run
//! # async fn run() -> shardline::Result<()> {
//! use shardline::{Client, ClientConfig};
//! use std::sync::Arc;
//!
//! let client = Client::new(ClientConfig::from_env()?)?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel::<shardline::DispatchEvent>(256);
//! let coordinator = client.connect(Arc::new(tx)).await?;
//!
//! while let Some(event) = rx.recv().await {
//!     println!("{} on shard {}", event.name, event.shard);
//! }
//! coordinator.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{ClientError, Result};
pub use shardline_common::{ClientConfig, ShardCount};
pub use shardline_core::{Intents, Snowflake, Token};
pub use shardline_gateway::{
    CoordinatorSettings, DispatchEvent, EventSink, GatewayDescriptor, GatewayEventType,
    SessionCoordinator, SessionSnapshot, SessionState, ShardId,
};
pub use shardline_http::{Method, Request, RequestScheduler, Response, Route};

use shardline_gateway::{Connector, TungsteniteConnector};
use shardline_http::{HttpTransport, ReqwestTransport, RequestError, RetryPolicy};
use std::sync::Arc;

/// REST and gateway entry point
pub struct Client {
    config: ClientConfig,
    rest: RequestScheduler,
}

impl Client {
    /// Build a client that talks to the configured API over HTTPS
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(
            config.http.api_base.clone(),
            &config.token,
            &config.http.user_agent,
            config.http.timeout,
        )?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over a custom HTTP transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let policy = RetryPolicy {
            max_retries: config.http.max_retries,
            max_rate_limit_retries: config.http.max_rate_limit_retries,
            ..RetryPolicy::default()
        };
        let rest = RequestScheduler::new(transport, policy);
        Self { config, rest }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The shared request scheduler
    pub fn rest(&self) -> &RequestScheduler {
        &self.rest
    }

    /// Fetch where to connect and how many sessions may be started
    ///
    /// Bot tokens use `/gateway/bot`; other tokens only get a URL and run a
    /// single shard.
    pub async fn fetch_gateway(&self) -> Result<GatewayDescriptor> {
        let route = if self.config.token.is_bot() {
            Route::get("/gateway/bot")
        } else {
            Route::get("/gateway")
        };

        let request = Request::new(&route).map_err(RequestError::from)?;
        let response = self.rest.submit(request).await?;
        let descriptor: GatewayDescriptor = response.json()?;

        tracing::info!(
            url = %descriptor.url,
            shards = descriptor.shards,
            remaining = descriptor.session_start_limit.remaining,
            max_concurrency = descriptor.session_start_limit.max_concurrency,
            "Fetched gateway descriptor"
        );

        Ok(descriptor)
    }

    /// Coordinator settings derived from the client configuration
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let gateway = &self.config.gateway;
        CoordinatorSettings {
            intents: self.config.intents,
            shard_count: match self.config.shards {
                ShardCount::Auto => None,
                ShardCount::Fixed(count) => Some(count),
            },
            shard_ids: self.config.shard_ids.clone(),
            version: gateway.version,
            large_threshold: gateway.large_threshold,
            identify_spacing: gateway.identify_spacing,
            hello_timeout: gateway.hello_timeout,
            ..CoordinatorSettings::new(self.config.token.clone())
        }
    }

    /// Fetch the gateway descriptor and start every configured shard
    pub async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<SessionCoordinator> {
        self.connect_with(Arc::new(TungsteniteConnector), sink).await
    }

    /// Like [`Client::connect`] over a custom connector
    pub async fn connect_with(
        &self,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn EventSink>,
    ) -> Result<SessionCoordinator> {
        if !self.config.token.can_connect_gateway() {
            return Err(shardline_gateway::GatewayError::GatewayNotAllowed.into());
        }

        let descriptor = self.fetch_gateway().await?;
        let coordinator =
            SessionCoordinator::start(self.coordinator_settings(), &descriptor, connector, sink)?;
        Ok(coordinator)
    }

    /// Stop the request scheduler; queued requests fail with `ShuttingDown`
    pub fn shutdown(&self) {
        self.rest.shutdown();
    }
}
