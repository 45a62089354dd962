//! Request scheduler
//!
//! Every bucket key gets one worker task, spawned on first use. The worker
//! owns the bucket's FIFO queue and runs exactly one exchange at a time, so
//! ordering within a bucket is the submission order. Workers of different
//! buckets never wait on each other except through the [`GlobalLimiter`].

use crate::codec::{ApiErrorBody, RateLimitHeaders, RateLimitedBody};
use crate::error::RequestError;
use crate::ratelimit::{BucketSnapshot, GlobalLimiter, RateLimitBucket};
use crate::request::{Request, Response, ResponseFuture};
use crate::route::{BucketKey, Route};
use crate::transport::HttpTransport;
use dashmap::DashMap;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;

/// Bounds on automatic retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries for 5xx responses and transport failures
    pub max_retries: u32,
    /// Retries for 429 responses
    pub max_rate_limit_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_rate_limit_retries: 10,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

struct QueuedRequest {
    request: Request,
    reply: oneshot::Sender<Result<Response, RequestError>>,
}

struct BucketHandle {
    bucket: Arc<RateLimitBucket>,
    queue: mpsc::UnboundedSender<QueuedRequest>,
}

struct SchedulerInner {
    transport: Arc<dyn HttpTransport>,
    buckets: DashMap<BucketKey, BucketHandle>,
    global: Arc<GlobalLimiter>,
    policy: RetryPolicy,
    closing: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

/// Rate-limited request scheduler
///
/// Cheap to clone; all clones share the same buckets.
#[derive(Clone)]
pub struct RequestScheduler {
    inner: Arc<SchedulerInner>,
}

impl RequestScheduler {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(SchedulerInner {
                transport,
                buckets: DashMap::new(),
                global: Arc::new(GlobalLimiter::new()),
                policy,
                closing: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    /// Queue a request on its bucket
    ///
    /// Returns immediately. Must be called from within a tokio runtime since
    /// the first submission to a bucket spawns its worker.
    pub fn submit(&self, request: Request) -> ResponseFuture {
        if self.is_shutting_down() {
            return ResponseFuture::ready(Err(RequestError::ShuttingDown));
        }

        let (reply, rx) = oneshot::channel();
        let key = request.bucket_key().clone();
        let queued = QueuedRequest { request, reply };

        let handle = self
            .inner
            .buckets
            .entry(key.clone())
            .or_insert_with(|| self.spawn_worker(key));

        if let Err(mpsc::error::SendError(rejected)) = handle.queue.send(queued) {
            let _ = rejected.reply.send(Err(RequestError::ShuttingDown));
        }

        ResponseFuture::new(rx)
    }

    /// Build and queue a request in one step
    ///
    /// Route and body mistakes are returned synchronously.
    pub fn submit_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        template: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<ResponseFuture, RequestError> {
        let route = params
            .iter()
            .fold(Route::new(method, template), |route, (name, value)| {
                route.param(*name, value)
            });

        let mut request = Request::new(&route)?;
        if let Some(body) = body {
            request = request.json(body)?;
        }

        Ok(self.submit(request))
    }

    fn spawn_worker(&self, key: BucketKey) -> BucketHandle {
        let bucket = Arc::new(RateLimitBucket::new(key));
        let (queue, rx) = mpsc::unbounded_channel();

        tracing::debug!(bucket = %bucket.key(), "Creating rate limit bucket");

        let worker = BucketWorker {
            bucket: Arc::clone(&bucket),
            transport: Arc::clone(&self.inner.transport),
            global: Arc::clone(&self.inner.global),
            policy: self.inner.policy,
            shutdown: self.inner.shutdown_tx.subscribe(),
        };
        tokio::spawn(worker.run(rx));

        BucketHandle { bucket, queue }
    }

    /// Quota state of every known bucket
    pub fn bucket_snapshots(&self) -> Vec<BucketSnapshot> {
        self.inner
            .buckets
            .iter()
            .map(|entry| entry.value().bucket.snapshot())
            .collect()
    }

    pub fn bucket_snapshot(&self, key: &BucketKey) -> Option<BucketSnapshot> {
        self.inner
            .buckets
            .get(key)
            .map(|entry| entry.value().bucket.snapshot())
    }

    pub fn bucket_count(&self) -> usize {
        self.inner.buckets.len()
    }

    pub fn global_limiter(&self) -> &GlobalLimiter {
        &self.inner.global
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    /// Stop accepting work and cancel everything queued or in flight
    ///
    /// Every outstanding [`ResponseFuture`] resolves to
    /// [`RequestError::ShuttingDown`].
    pub fn shutdown(&self) {
        if self.inner.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(buckets = self.bucket_count(), "Shutting down request scheduler");
        self.inner.shutdown_tx.send_replace(true);
    }
}

/// Completes when shutdown is signalled; never completes if the scheduler
/// was dropped without a shutdown
async fn shutdown_signalled(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|closing| *closing).await.is_err() {
        std::future::pending::<()>().await;
    }
}

struct BucketWorker {
    bucket: Arc<RateLimitBucket>,
    transport: Arc<dyn HttpTransport>,
    global: Arc<GlobalLimiter>,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl BucketWorker {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<QueuedRequest>) {
        loop {
            let queued = tokio::select! {
                biased;
                () = shutdown_signalled(self.shutdown.clone()) => break,
                next = queue.recv() => match next {
                    Some(queued) => queued,
                    None => return,
                },
            };

            let result = tokio::select! {
                biased;
                () = shutdown_signalled(self.shutdown.clone()) => Err(RequestError::ShuttingDown),
                result = self.execute(&queued.request) => result,
            };

            let _ = queued.reply.send(result);
        }

        queue.close();
        while let Ok(queued) = queue.try_recv() {
            let _ = queued.reply.send(Err(RequestError::ShuttingDown));
        }
    }

    async fn wait_for_quota(&self) {
        loop {
            if let Some(delay) = self.bucket.wait_time() {
                tracing::debug!(
                    bucket = %self.bucket.key(),
                    delay_ms = delay.as_millis() as u64,
                    "Bucket exhausted, waiting for reset"
                );
                sleep(delay).await;
                continue;
            }

            if self.global.is_locked() {
                self.global.wait().await;
                continue;
            }

            return;
        }
    }

    /// Run one request to completion, retrying 429s, 5xx and transport failures
    async fn execute(&self, request: &Request) -> Result<Response, RequestError> {
        let mut rate_limited = 0u32;
        let mut failures = 0u32;

        loop {
            self.wait_for_quota().await;
            self.bucket.consume();

            let response = match self.transport.execute(request).await {
                Ok(response) => response,
                Err(err) => {
                    failures += 1;
                    if !self.backoff_before_retry(failures, &err).await {
                        return Err(RequestError::Transport {
                            source: err,
                            attempts: failures,
                        });
                    }
                    continue;
                }
            };

            let headers = RateLimitHeaders::parse(&response.headers);
            self.bucket.update(&headers);

            let status = response.status;
            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_limited += 1;
                if rate_limited > self.policy.max_rate_limit_retries {
                    return Err(RequestError::RateLimitRetriesExhausted {
                        attempts: rate_limited,
                    });
                }
                self.absorb_rate_limit(&headers, &response.body);
                continue;
            }

            if status.is_server_error() {
                failures += 1;
                if !self.backoff_before_retry(failures, &status).await {
                    return Err(RequestError::Server {
                        status,
                        attempts: failures,
                    });
                }
                continue;
            }

            if status.is_client_error() {
                return Err(RequestError::Http {
                    status,
                    body: ApiErrorBody::parse(&response.body),
                });
            }

            return Ok(response);
        }
    }

    /// Sleep before the next attempt; false once retries are used up
    async fn backoff_before_retry(
        &self,
        failures: u32,
        cause: &(dyn std::fmt::Display + Sync),
    ) -> bool {
        if failures > self.policy.max_retries {
            tracing::error!(
                bucket = %self.bucket.key(),
                attempts = failures,
                cause = %cause,
                "Request failed, giving up"
            );
            return false;
        }

        let delay = self.policy.backoff(failures);
        tracing::warn!(
            bucket = %self.bucket.key(),
            attempt = failures,
            delay_ms = delay.as_millis() as u64,
            cause = %cause,
            "Request failed, retrying"
        );
        sleep(delay).await;
        true
    }

    fn absorb_rate_limit(&self, headers: &RateLimitHeaders, body: &[u8]) {
        let parsed = RateLimitedBody::parse(body);
        let retry_after = parsed
            .as_ref()
            .map(RateLimitedBody::retry_after)
            .or_else(|| headers.retry_after_delay())
            .or_else(|| headers.reset_in())
            .unwrap_or(Duration::from_secs(1));
        let global = headers.global || parsed.as_ref().is_some_and(|body| body.global);

        if global {
            tracing::warn!(
                retry_after_ms = retry_after.as_millis() as u64,
                "Global rate limit hit, halting all buckets"
            );
            self.global.lock_for(retry_after);
        } else {
            tracing::warn!(
                bucket = %self.bucket.key(),
                retry_after_ms = retry_after.as_millis() as u64,
                scope = headers.scope.as_deref().unwrap_or("user"),
                "Rate limited, retrying"
            );
            self.bucket.exhaust(retry_after);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET_AFTER, MAX_DELAY};
    use crate::error::TransportError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use reqwest::header::{HeaderMap, HeaderValue};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    type Responder = Box<dyn Fn(usize) -> Result<Response, TransportError> + Send + Sync>;

    struct Call {
        path: String,
        body: Option<Vec<u8>>,
        at: Instant,
    }

    struct MockTransport {
        responder: Responder,
        delay: Duration,
        calls: Mutex<Vec<Call>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockTransport {
        fn new(delay: Duration, responder: Responder) -> Arc<Self> {
            Arc::new(Self {
                responder,
                delay,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            })
        }

        fn ok() -> Arc<Self> {
            Self::new(Duration::ZERO, Box::new(|_| Ok(response(200, &[], "{}"))))
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().iter().map(|c| c.at).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn execute(&self, request: &Request) -> Result<Response, TransportError> {
            let index = {
                let mut calls = self.calls.lock();
                calls.push(Call {
                    path: request.path().to_string(),
                    body: request.body().map(<[u8]>::to_vec),
                    at: Instant::now(),
                });
                calls.len() - 1
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            (self.responder)(index)
        }
    }

    fn response(status: u16, headers: &[(&'static str, String)], body: &str) -> Response {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            map,
            body.as_bytes().to_vec(),
        )
    }

    fn scheduler(transport: Arc<MockTransport>, policy: RetryPolicy) -> RequestScheduler {
        RequestScheduler::new(transport, policy)
    }

    fn message_request(channel: u64, n: u32) -> Request {
        Request::new(&Route::post("/channels/{channel_id}/messages").param("channel_id", channel))
            .unwrap()
            .json(&json!({ "n": n }))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_within_bucket() {
        let transport = MockTransport::new(
            Duration::from_millis(50),
            Box::new(|_| Ok(response(200, &[], "{}"))),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let futures: Vec<_> = (0..5)
            .map(|n| scheduler.submit(message_request(1, n)))
            .collect();
        for future in futures {
            future.await.unwrap();
        }

        let bodies: Vec<_> = transport
            .calls
            .lock()
            .iter()
            .map(|c| c.body.clone().unwrap())
            .collect();
        let expected: Vec<_> = (0..5)
            .map(|n| serde_json::to_vec(&json!({ "n": n })).unwrap())
            .collect();
        assert_eq!(bodies, expected);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.bucket_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_buckets_run_concurrently() {
        let transport = MockTransport::new(
            Duration::from_secs(1),
            Box::new(|_| Ok(response(200, &[], "{}"))),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let start = Instant::now();
        let a = scheduler.submit(message_request(1, 0));
        let b = scheduler.submit(message_request(2, 0));
        let (a, b) = tokio::join!(a, b);
        a.unwrap();
        b.unwrap();

        assert!(start.elapsed() < Duration::from_millis(1500));
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.bucket_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_bucket_waits_for_reset() {
        // limit=5: remaining counts down 4,3,2,1,0 with a 2.5s window
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|index| {
                let remaining = 4usize.saturating_sub(index).to_string();
                Ok(response(
                    200,
                    &[
                        (HEADER_LIMIT, "5".to_string()),
                        (HEADER_REMAINING, remaining),
                        (HEADER_RESET_AFTER, "2.5".to_string()),
                    ],
                    "{}",
                ))
            }),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let futures: Vec<_> = (0..6)
            .map(|n| scheduler.submit(message_request(1, n)))
            .collect();
        for future in futures {
            future.await.unwrap();
        }

        let times = transport.call_times();
        assert_eq!(times.len(), 6);
        let gap = times[5] - times[4];
        assert!(gap >= Duration::from_millis(2500), "dispatched after {gap:?}");
        assert!(gap < Duration::from_millis(2600), "dispatched after {gap:?}");
        assert!(times[4] - times[0] < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_reset_header_keeps_bucket_alive() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|index| {
                let headers = if index == 0 {
                    vec![
                        (HEADER_LIMIT, "1".to_string()),
                        (HEADER_REMAINING, "0".to_string()),
                        (HEADER_RESET_AFTER, "1e300".to_string()),
                    ]
                } else {
                    Vec::new()
                };
                Ok(response(200, &headers, "{}"))
            }),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        scheduler.submit(message_request(1, 0)).await.unwrap();
        scheduler.submit(message_request(1, 1)).await.unwrap();

        let times = transport.call_times();
        assert_eq!(times.len(), 2);
        let gap = times[1] - times[0];
        assert!(gap >= MAX_DELAY, "dispatched after {gap:?}");
        assert!(gap < MAX_DELAY + Duration::from_secs(1), "dispatched after {gap:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_is_retried_transparently() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|index| {
                if index == 0 {
                    Ok(response(
                        429,
                        &[],
                        r#"{"message":"You are being rate limited.","retry_after":1.0,"global":false}"#,
                    ))
                } else {
                    Ok(response(200, &[], r#"{"id":"42"}"#))
                }
            }),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let response = scheduler.submit(message_request(1, 0)).await.unwrap();
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], "42");

        let times = transport.call_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_429_halts_other_buckets() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|index| {
                if index == 0 {
                    Ok(response(
                        429,
                        &[],
                        r#"{"message":"global","retry_after":2.0,"global":true}"#,
                    ))
                } else {
                    Ok(response(200, &[], "{}"))
                }
            }),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let start = Instant::now();
        let first = scheduler.submit(message_request(1, 0));
        sleep(Duration::from_millis(10)).await;
        assert!(scheduler.global_limiter().is_locked());

        let second = scheduler.submit(message_request(2, 0));
        let (first, second) = tokio::join!(first, second);
        first.unwrap();
        second.unwrap();

        let calls = transport.calls.lock();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].at - start >= Duration::from_secs(2));
        assert!(calls[2].at - start >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_surfaced() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|_| Ok(response(404, &[], r#"{"message":"Unknown Channel","code":10003}"#))),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let err = scheduler.submit(message_request(1, 0)).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(err.api_code(), Some(10003));
        assert_eq!(transport.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retry_then_fail() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|_| Ok(response(502, &[], "Bad Gateway"))),
        );
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let scheduler = scheduler(Arc::clone(&transport), policy);

        let err = scheduler.submit(message_request(1, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Server { status, attempts: 3 } if status == StatusCode::BAD_GATEWAY
        ));

        let times = transport.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(500));
        assert!(times[2] - times[1] >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_recovers() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|index| {
                if index == 0 {
                    Ok(response(500, &[], ""))
                } else {
                    Ok(response(204, &[], ""))
                }
            }),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let response = scheduler.submit(message_request(1, 0)).await.unwrap();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_retry_then_fail() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|_| Err(TransportError::Timeout)),
        );
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let scheduler = scheduler(Arc::clone(&transport), policy);

        let err = scheduler.submit(message_request(1, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::Transport {
                source: TransportError::Timeout,
                attempts: 2
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_are_bounded() {
        let transport = MockTransport::new(
            Duration::ZERO,
            Box::new(|_| Ok(response(429, &[], r#"{"retry_after":0.1}"#))),
        );
        let policy = RetryPolicy {
            max_rate_limit_retries: 2,
            ..RetryPolicy::default()
        };
        let scheduler = scheduler(Arc::clone(&transport), policy);

        let err = scheduler.submit(message_request(1, 0)).await.unwrap_err();
        assert!(matches!(
            err,
            RequestError::RateLimitRetriesExhausted { attempts: 3 }
        ));
        assert_eq!(transport.calls.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_requests() {
        let transport = MockTransport::new(
            Duration::from_secs(10),
            Box::new(|_| Ok(response(200, &[], "{}"))),
        );
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        let futures: Vec<_> = (0..3)
            .map(|n| scheduler.submit(message_request(1, n)))
            .collect();
        sleep(Duration::from_millis(10)).await;

        scheduler.shutdown();
        assert!(scheduler.is_shutting_down());

        for future in futures {
            assert!(matches!(future.await, Err(RequestError::ShuttingDown)));
        }

        let late = scheduler.submit(message_request(1, 9)).await;
        assert!(matches!(late, Err(RequestError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_submit_request_rejects_bad_route() {
        let scheduler = scheduler(MockTransport::ok(), RetryPolicy::default());

        let result = scheduler.submit_request::<serde_json::Value>(
            Method::GET,
            "/channels/{channel_id}",
            &[],
            None,
        );
        assert!(matches!(
            result,
            Err(RequestError::Route(crate::error::RouteError::MissingParam(_)))
        ));
        assert_eq!(scheduler.bucket_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_request_builds_path() {
        let transport = MockTransport::ok();
        let scheduler = scheduler(Arc::clone(&transport), RetryPolicy::default());

        scheduler
            .submit_request(
                Method::PATCH,
                "/guilds/{guild_id}/members/{user_id}",
                &[("guild_id", "1"), ("user_id", "2")],
                Some(&json!({"nick": "x"})),
            )
            .unwrap()
            .await
            .unwrap();

        assert_eq!(transport.calls.lock()[0].path, "/guilds/1/members/2");
        let snapshots = scheduler.bucket_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].key.template(), "/guilds/{guild_id}/members/{user_id}");
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
    }
}
