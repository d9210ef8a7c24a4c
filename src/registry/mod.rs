//! Model registry for the prediction gateway.
//!
//! Maps model identifiers to the base address of the microservice
//! serving that model. Built once at startup and read-only afterwards.

mod model_registry;

pub use model_registry::{ModelRegistry, RegistryError};
