//! Prediction relay and downstream health probing.
//!
//! Resolves model identifiers through the [`ModelRegistry`](crate::registry::ModelRegistry),
//! forwards prediction payloads to the owning microservice and maps every
//! downstream outcome into either the relayed result or a [`GatewayError`].

mod engine;
mod error;
mod health;
mod transport;

pub use engine::{model_field, RelayEngine};
pub use error::{ErrorKind, GatewayError};
pub use health::HealthReport;
pub use transport::{DownstreamResponse, HttpTransport, Transport, TransportError};
