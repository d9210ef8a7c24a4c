//! Request dispatch for the gateway's HTTP surface.

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Map, Value};

use crate::relay::{model_field, HealthReport};

use super::error::{json_response, raw_json_response, ApiError};
use super::roads::roads;
use super::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Known routes, used to tell 404 from 405.
const ROUTES: [&str; 4] = ["/roads", "/predict", "/expert-predict", "/health"];

/// Handles one inbound request.
///
/// Never fails: gateway errors become JSON error bodies, and a panic in a
/// handler becomes a generic 500. CORS headers are added to every response.
pub async fn handle<B>(
    state: Arc<AppState>,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let outcome = AssertUnwindSafe(dispatch(&state, req)).catch_unwind().await;
    let mut response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            if err.status().is_server_error() {
                tracing::warn!(method = %method, path = %path, error = %err, "request failed");
            }
            err.into_response()
        }
        Err(_) => {
            tracing::error!(method = %method, path = %path, "handler panicked");
            ApiError::Internal.into_response()
        }
    };

    apply_cors(&mut response, &state.cors_allow_origin);

    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request completed"
    );

    Ok(response)
}

async fn dispatch<B>(state: &AppState, req: Request<B>) -> Result<Response<Full<Bytes>>, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();
    let path = normalize_path(req.uri().path());

    match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => Ok(preflight()),
        (&Method::GET, "/roads") => Ok(json_response(StatusCode::OK, &roads())),
        (&Method::POST, "/predict") => {
            let payload = read_json(req, state.max_body_bytes).await?;
            let result = state.engine.relay(None, &payload).await?;
            Ok(raw_json_response(StatusCode::OK, result))
        }
        (&Method::POST, "/expert-predict") => {
            let payload = read_json(req, state.max_body_bytes).await?;
            let model = model_field(&payload).ok_or(ApiError::MissingModel)?;
            let result = state.engine.relay(Some(model), &payload).await?;
            Ok(raw_json_response(StatusCode::OK, result))
        }
        (&Method::GET, "/health") => {
            let report: HealthReport = state.engine.health_check().await;
            Ok(json_response(StatusCode::OK, &json!({ "services": report })))
        }
        (_, known) if ROUTES.contains(&known) => Err(ApiError::MethodNotAllowed {
            method: method.to_string(),
            path: path.clone(),
        }),
        _ => Err(ApiError::NotFound(path.clone())),
    }
}

/// Strips trailing slashes so `/predict/` routes like `/predict`.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Reads and parses a JSON body, bounded by `limit` bytes.
///
/// An empty body is treated as an empty object.
async fn read_json<B>(req: Request<B>, limit: usize) -> Result<Value, ApiError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let body = Limited::new(req.into_body(), limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ApiError::PayloadTooLarge(limit)
            } else {
                ApiError::BodyRead(e.to_string())
            }
        })?
        .to_bytes();

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))
}

fn preflight() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn apply_cors(response: &mut Response<Full<Bytes>>, allow_origin: &HeaderValue) {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin.clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}
