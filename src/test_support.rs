//! Test doubles for downstream prediction services.
//!
//! `spawn_stub` runs a real HTTP service on an ephemeral port using the
//! same hyper stack as the gateway. `MockTransport` replaces the network
//! entirely and records every call.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::relay::{DownstreamResponse, Transport, TransportError};

// ========== Stub HTTP Service ==========

/// A request observed by a stub service.
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// What a stub service answers with.
#[derive(Debug, Clone)]
pub struct StubReply {
    pub status: u16,
    pub body: Bytes,
    pub delay: Option<Duration>,
}

impl StubReply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: Bytes::from(body.to_string()),
            delay: None,
        }
    }

    /// Replies with the request body unchanged.
    pub fn echo(request: &StubRequest) -> Self {
        Self {
            status: 200,
            body: request.body.clone(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Handle to a running stub service.
pub struct Stub {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl Stub {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Starts a stub HTTP service answering every request with `reply`.
pub async fn spawn_stub<F>(reply: F) -> Stub
where
    F: Fn(&StubRequest) -> StubReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let reply = Arc::new(reply);

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let recorded = Arc::clone(&recorded);
            let reply = Arc::clone(&reply);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let recorded = Arc::clone(&recorded);
                    let reply = Arc::clone(&reply);
                    async move {
                        let method = req.method().to_string();
                        let path = req.uri().path().to_string();
                        let content_type = req
                            .headers()
                            .get(CONTENT_TYPE)
                            .and_then(|v| v.to_str().ok())
                            .map(String::from);
                        let body = req
                            .into_body()
                            .collect()
                            .await
                            .map(|b| b.to_bytes())
                            .unwrap_or_default();

                        let request = StubRequest {
                            method,
                            path,
                            content_type,
                            body,
                        };
                        let answer = (*reply)(&request);
                        recorded.lock().unwrap().push(request);

                        if let Some(delay) = answer.delay {
                            tokio::time::sleep(delay).await;
                        }

                        let response = Response::builder()
                            .status(answer.status)
                            .header(CONTENT_TYPE, "application/json")
                            .body(Full::new(answer.body))
                            .unwrap();
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    Stub { addr, requests }
}

/// Returns a local address with nothing listening on it.
pub fn unused_local_addr() -> SocketAddr {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

// ========== Mock Transport ==========

/// Scripted outcome for a mocked outbound call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(u16, &'static str),
    Echo,
    NoResponse(&'static str),
    SetupFailure(&'static str),
    /// Never answers.
    Hang,
    /// Panics inside the transport call.
    Panic,
}

/// A call recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub url: String,
    pub body: Option<Bytes>,
}

/// In-memory [`Transport`] with per-URL scripted replies.
pub struct MockTransport {
    predict_reply: MockReply,
    probe_replies: HashMap<String, MockReply>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockTransport {
    pub fn new(predict_reply: MockReply) -> Self {
        Self {
            predict_reply,
            probe_replies: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_probe(mut self, url: &str, reply: MockReply) -> Self {
        self.probe_replies.insert(url.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(reply: &MockReply, url: &str, body: &Bytes) -> Result<DownstreamResponse, TransportError> {
        match reply {
            MockReply::Respond(status, text) => Ok(DownstreamResponse {
                status: *status,
                body: Bytes::from_static(text.as_bytes()),
            }),
            MockReply::Echo => Ok(DownstreamResponse {
                status: 200,
                body: body.clone(),
            }),
            MockReply::NoResponse(message) => Err(TransportError::NoResponse {
                url: url.to_string(),
                message: message.to_string(),
            }),
            MockReply::SetupFailure(message) => Err(TransportError::Setup {
                url: url.to_string(),
                message: message.to_string(),
            }),
            MockReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::NoResponse {
                    url: url.to_string(),
                    message: "hung".to_string(),
                })
            }
            MockReply::Panic => panic!("transport fault while calling {}", url),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(&self, url: &str, body: Bytes) -> Result<DownstreamResponse, TransportError> {
        self.calls.lock().unwrap().push(MockCall {
            url: url.to_string(),
            body: Some(body.clone()),
        });
        Self::answer(&self.predict_reply, url, &body).await
    }

    async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, TransportError> {
        self.calls.lock().unwrap().push(MockCall {
            url: url.to_string(),
            body: None,
        });
        let reply = self
            .probe_replies
            .get(url)
            .cloned()
            .unwrap_or(MockReply::Respond(200, "ok"));
        Self::answer(&reply, url, &Bytes::new())
            .await
            .map(|response| response.status)
    }
}
