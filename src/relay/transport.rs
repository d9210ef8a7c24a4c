//! Outbound HTTP transport to prediction microservices.
//!
//! The [`Transport`] trait reports raw outcomes only: a response (any
//! status), no response, or a request that could not be sent. Mapping
//! those outcomes to gateway errors is the engine's job.

use std::error::Error as StdError;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

/// Raw downstream reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownstreamResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Transport-level failure of an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request went out (or was attempted on the wire) but no response
    /// arrived: timeout, refused connection, reset, DNS failure.
    #[error("no response from {url}: {message}")]
    NoResponse { url: String, message: String },

    /// The request could not be constructed.
    #[error("could not build request for {url}: {message}")]
    Setup { url: String, message: String },
}

/// Outbound calls used by the relay engine.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `body` as `application/json` to `url`.
    async fn post_json(&self, url: &str, body: Bytes) -> Result<DownstreamResponse, TransportError>;

    /// Issues a reachability GET to `url` and returns the status code.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, TransportError>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
///
/// Cloning the client shares its connection pool, so one instance serves
/// every in-flight relay and probe.
pub struct HttpTransport {
    client: Client,
    relay_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Creates a transport whose prediction calls are bounded by `relay_timeout`.
    ///
    /// `None` lets a prediction call wait indefinitely.
    pub fn new(relay_timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            relay_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: Bytes) -> Result<DownstreamResponse, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(timeout) = self.relay_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| classify(url, e))?;

        Ok(DownstreamResponse { status, body })
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        Ok(response.status().as_u16())
    }
}

/// Splits reqwest failures into "never built" and "no response".
fn classify(url: &str, err: reqwest::Error) -> TransportError {
    let url = url.to_string();
    let message = error_chain(&err);

    if err.is_builder() {
        TransportError::Setup { url, message }
    } else {
        TransportError::NoResponse { url, message }
    }
}

/// Joins an error and its sources, since reqwest's top-level message
/// omits the underlying cause (refused, reset, timed out).
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
