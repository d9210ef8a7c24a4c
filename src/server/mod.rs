//! HTTP server for the prediction gateway.
//!
//! Serves `/roads`, `/predict`, `/expert-predict` and `/health` over
//! HTTP/1.1, one tokio task per connection.

mod error;
mod handlers;
mod roads;

use std::future::Future;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::{ConfigError, GatewayConfig};
use crate::relay::RelayEngine;

pub use handlers::handle;

/// State shared by every connection.
pub struct AppState {
    pub(crate) engine: RelayEngine,
    pub(crate) max_body_bytes: usize,
    pub(crate) cors_allow_origin: HeaderValue,
}

impl AppState {
    pub fn new(engine: RelayEngine, config: &GatewayConfig) -> Result<Self, ConfigError> {
        let cors_allow_origin = HeaderValue::from_str(&config.cors_allow_origin)
            .map_err(|_| ConfigError::InvalidCorsOrigin(config.cors_allow_origin.clone()))?;

        Ok(Self {
            engine,
            max_body_bytes: config.max_body_bytes,
            cors_allow_origin,
        })
    }
}

/// Accepts connections on `listener` until `shutdown` resolves.
///
/// In-flight connections keep running on their own tasks after shutdown
/// is signalled; only the accept loop stops.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            () = &mut shutdown => {
                tracing::info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, peer = %peer, "connection error");
            }
        });
    }
}
