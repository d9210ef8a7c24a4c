//! Caller-facing errors and JSON response helpers.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use crate::relay::GatewayError;

/// Errors surfaced to HTTP callers.
///
/// Every variant renders as `{ "error", "kind", "detail" }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("request body must include a string 'model' field")]
    MissingModel,

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("no route for {0}")]
    NotFound(String),

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Gateway(e) => e.status(),
            ApiError::MalformedBody(_) | ApiError::MissingModel | ApiError::BodyRead(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Gateway(e) => e.kind().as_str(),
            ApiError::MalformedBody(_) => "MalformedBody",
            ApiError::MissingModel => "MissingModel",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::BodyRead(_) => "BodyRead",
            ApiError::NotFound(_) => "NotFound",
            ApiError::MethodNotAllowed { .. } => "MethodNotAllowed",
            ApiError::Internal => "Internal",
        }
    }

    fn detail(&self) -> Value {
        match self {
            ApiError::Gateway(e) => e.detail().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "detail": self.detail(),
        });
        json_response(self.status(), &body)
    }
}

/// Serializes `value` into a JSON response.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => raw_json_response(status, Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize response body");
            raw_json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                Bytes::from_static(br#"{"error":"internal server error","kind":"Internal","detail":null}"#),
            )
        }
    }
}

/// Wraps already-encoded JSON bytes in a response.
pub fn raw_json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_gateway_error_body() {
        let err = ApiError::from(GatewayError::rejected("xgboost", 500, br#"{"detail":"bad input"}"#));
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = body_json(response).await;
        assert_eq!(body["kind"], "DownstreamRejected");
        assert_eq!(body["detail"]["detail"], "bad input");
        assert!(body["error"].as_str().unwrap().contains("bad input"));
    }

    #[tokio::test]
    async fn test_local_error_has_null_detail() {
        let response = ApiError::MissingModel.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "MissingModel");
        assert!(body["detail"].is_null());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::PayloadTooLarge(10).status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::NotFound("/x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::MethodNotAllowed {
                method: "GET".into(),
                path: "/predict".into()
            }
            .status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::from(GatewayError::unreachable("timed out")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
