//! Concurrent reachability probes across all registered services.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;

use super::engine::RelayEngine;

/// Reachability of a single downstream service.
///
/// Any HTTP response counts as reachable, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub reachable: bool,
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceHealth {
    fn up(status: u16) -> Self {
        Self {
            reachable: true,
            status: Some(status),
            message: None,
        }
    }

    fn down(message: String) -> Self {
        Self {
            reachable: false,
            status: None,
            message: Some(message),
        }
    }
}

/// Model identifier to probe outcome.
pub type HealthReport = BTreeMap<String, ServiceHealth>;

impl RelayEngine {
    /// Probes every registered service concurrently.
    ///
    /// Each probe is bounded by the probe timeout on its own; the call
    /// returns once every probe has finished or timed out.
    pub async fn health_check(&self) -> HealthReport {
        let timeout = self.probe_timeout;

        let probes = self.registry.entries().iter().map(|entry| async move {
            let outcome =
                tokio::time::timeout(timeout, self.transport.probe(&entry.base_address, timeout)).await;

            let health = match outcome {
                Ok(Ok(status)) => ServiceHealth::up(status),
                Ok(Err(e)) => ServiceHealth::down(e.to_string()),
                Err(_) => ServiceHealth::down(format!(
                    "no response within {}ms",
                    timeout.as_millis()
                )),
            };

            if !health.reachable {
                tracing::warn!(
                    model = %entry.name,
                    address = %entry.base_address,
                    error = health.message.as_deref().unwrap_or(""),
                    "service unreachable"
                );
            }

            (entry.name.clone(), health)
        });

        join_all(probes).await.into_iter().collect()
    }
}
