//! Requests, responses, and the future handed back on submission

use crate::error::{RequestError, RouteError};
use crate::route::{BucketKey, Route};
use reqwest::{header::HeaderMap, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// A compiled request ready for the scheduler
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    key: BucketKey,
    body: Option<Vec<u8>>,
    reason: Option<String>,
}

impl Request {
    pub fn new(route: &Route) -> Result<Self, RouteError> {
        let (path, key) = route.compile()?;
        Ok(Self {
            method: route.method().clone(),
            path,
            key,
            body: None,
            reason: None,
        })
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, RequestError> {
        self.body = Some(serde_json::to_vec(body).map_err(RequestError::Body)?);
        Ok(self)
    }

    /// Attach an audit log reason
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn bucket_key(&self) -> &BucketKey {
        &self.key
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn audit_reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_slice(&self.body).map_err(RequestError::Decode)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Resolves once the scheduler has finished a submission
///
/// A submission whose worker went away resolves to
/// [`RequestError::ShuttingDown`] rather than hanging.
#[derive(Debug)]
pub struct ResponseFuture {
    rx: oneshot::Receiver<Result<Response, RequestError>>,
}

impl ResponseFuture {
    pub(crate) fn new(rx: oneshot::Receiver<Result<Response, RequestError>>) -> Self {
        Self { rx }
    }

    pub(crate) fn ready(result: Result<Response, RequestError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, RequestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RequestError::ShuttingDown)))
    }
}
