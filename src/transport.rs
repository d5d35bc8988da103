use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode, Url};

use crate::BoxError;

/// Fully materialized request handed to a [`Transport`].
///
/// The same value is sent on every attempt, so the body is kept as
/// [`Bytes`] rather than a stream.
#[derive(Clone, Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
}

/// Response received from a [`Transport`] with its body fully read.
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Anything that can execute a prepared request.
///
/// Implementations must tolerate being called repeatedly with the same
/// request and concurrently from independent requests. Every error is
/// treated as retryable by the send loop.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &PreparedRequest) -> Result<TransportResponse, BoxError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: &PreparedRequest) -> Result<TransportResponse, BoxError> {
        let mut builder = self
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
