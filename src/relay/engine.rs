//! Single-call prediction relay.

use std::sync::Arc;
use std::time::Duration;

use hyper::body::Bytes;
use serde_json::Value;

use crate::registry::ModelRegistry;

use super::error::GatewayError;
use super::transport::Transport;

/// Field carrying the model identifier on expert requests.
const MODEL_FIELD: &str = "model";

/// Routes prediction payloads to model microservices.
///
/// Holds the registry read-only and shares one transport across all
/// in-flight requests. Every successful resolution results in exactly
/// one outbound call; nothing is retried.
pub struct RelayEngine {
    pub(super) registry: Arc<ModelRegistry>,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) probe_timeout: Duration,
    default_model: String,
}

impl RelayEngine {
    /// Creates an engine.
    ///
    /// `default_model` is used when a request does not name a model. It is
    /// not required to be registered; if it is not, such requests fail with
    /// `UnsupportedModel`.
    pub fn new(
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn Transport>,
        default_model: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            probe_timeout,
            default_model: default_model.into(),
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Forwards `payload` to the service for `model` and returns its body.
    ///
    /// `None` selects the default model. A 2xx reply body is returned
    /// verbatim, without validation.
    pub async fn relay(&self, model: Option<&str>, payload: &Value) -> Result<Bytes, GatewayError> {
        let model = model.unwrap_or(&self.default_model);

        let base = self.registry.resolve(model).ok_or_else(|| {
            tracing::debug!(model = model, "rejecting unsupported model");
            GatewayError::unsupported_model(model)
        })?;
        let target = predict_url(base);

        let body = serde_json::to_vec(payload)
            .map_err(|e| GatewayError::setup_failure(format!("failed to serialize payload: {}", e)))?;

        tracing::debug!(model = model, target = %target, bytes = body.len(), "relaying prediction");

        let response = self
            .transport
            .post_json(&target, Bytes::from(body))
            .await
            .map_err(|e| {
                tracing::warn!(model = model, target = %target, error = %e, "prediction call failed");
                GatewayError::from(e)
            })?;

        if (200..300).contains(&response.status) {
            Ok(response.body)
        } else {
            tracing::warn!(
                model = model,
                target = %target,
                status = response.status,
                "prediction service rejected request"
            );
            Err(GatewayError::rejected(model, response.status, &response.body))
        }
    }
}

/// Returns the prediction endpoint for a base address.
pub fn predict_url(base_address: &str) -> String {
    format!("{}/predict/", base_address.trim_end_matches('/'))
}

/// Extracts the string `model` field from an expert payload.
///
/// Returns `None` when the payload is not an object or the field is
/// absent or not a string.
pub fn model_field(payload: &Value) -> Option<&str> {
    payload.get(MODEL_FIELD).and_then(Value::as_str)
}
