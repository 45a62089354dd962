//! # shardline-http
//!
//! Rate-limited REST request scheduling.
//!
//! Requests are grouped into quota buckets keyed by method, route template and
//! major parameters. Each bucket executes its requests one at a time in
//! submission order, while distinct buckets run in parallel.

pub mod codec;
pub mod error;
pub mod ratelimit;
pub mod request;
pub mod route;
pub mod scheduler;
pub mod transport;

pub use codec::{ApiErrorBody, RateLimitHeaders, RateLimitedBody};
pub use error::{RequestError, Result, RouteError, TransportError};
pub use ratelimit::{BucketSnapshot, GlobalLimiter, RateLimitBucket};
pub use request::{Request, Response, ResponseFuture};
pub use reqwest::{header::HeaderMap, Method, StatusCode};
pub use route::{BucketKey, Route, MAJOR_PARAMETERS};
pub use scheduler::{RequestScheduler, RetryPolicy};
pub use transport::{HttpTransport, ReqwestTransport};
