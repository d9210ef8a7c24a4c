//! Gateway error taxonomy.

use hyper::StatusCode;
use serde_json::Value;

use super::transport::TransportError;

const UNKNOWN_DOWNSTREAM_ERROR: &str = "unknown error from prediction service";

/// Failure classes produced by the relay engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No registry entry for the requested model. Detected before any network call.
    UnsupportedModel,
    /// Downstream answered with a non-2xx status.
    DownstreamRejected,
    /// Request was sent but no response arrived.
    DownstreamUnreachable,
    /// Request could not be built or sent.
    RequestSetupFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::UnsupportedModel => "UnsupportedModel",
            ErrorKind::DownstreamRejected => "DownstreamRejected",
            ErrorKind::DownstreamUnreachable => "DownstreamUnreachable",
            ErrorKind::RequestSetupFailure => "RequestSetupFailure",
        }
    }
}

/// Normalized failure returned to the caller instead of a prediction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
    kind: ErrorKind,
    status: StatusCode,
    message: String,
    detail: Option<Value>,
}

impl GatewayError {
    pub fn unsupported_model(model: &str) -> Self {
        Self {
            kind: ErrorKind::UnsupportedModel,
            status: StatusCode::BAD_REQUEST,
            message: format!("unsupported model: {}", model),
            detail: Some(serde_json::json!({ "model": model })),
        }
    }

    /// Builds a `DownstreamRejected` error from a non-2xx downstream reply.
    ///
    /// The status mirrors the downstream code when it is a 4xx/5xx; anything
    /// else becomes 502. The detail carries the downstream body, parsed as
    /// JSON when possible.
    pub fn rejected(model: &str, status: u16, body: &[u8]) -> Self {
        let status = StatusCode::from_u16(status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);

        let detail = downstream_detail(body);
        let message = match detail.get("detail").and_then(Value::as_str) {
            Some(reason) => format!("prediction service for model '{}' rejected the request: {}", model, reason),
            None => format!("prediction service for model '{}' returned {}", model, status.as_u16()),
        };

        Self {
            kind: ErrorKind::DownstreamRejected,
            status,
            message,
            detail: Some(detail),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::DownstreamUnreachable,
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: Some(Value::String(message.clone())),
            message: format!("prediction service unreachable: {}", message),
        }
    }

    pub fn setup_failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::RequestSetupFailure,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: Some(Value::String(message.clone())),
            message: format!("failed to send request to prediction service: {}", message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }
}

impl From<TransportError> for GatewayError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::NoResponse { .. } => Self::unreachable(err.to_string()),
            TransportError::Setup { .. } => Self::setup_failure(err.to_string()),
        }
    }
}

/// Extracts the most useful diagnostic from a downstream error body.
fn downstream_detail(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => return Value::String(UNKNOWN_DOWNSTREAM_ERROR.to_string()),
        Ok(value) => return value,
        Err(_) => {}
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        Value::String(UNKNOWN_DOWNSTREAM_ERROR.to_string())
    } else {
        Value::String(text.to_string())
    }
}
