//! Immutable model-to-address table.

use std::collections::HashMap;

use reqwest::Url;

/// Errors raised while building a [`ModelRegistry`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model identifier must not be empty")]
    EmptyIdentifier,

    #[error("model '{0}' is registered more than once")]
    DuplicateIdentifier(String),

    #[error("invalid base address '{address}' for model '{model}': {reason}")]
    InvalidAddress {
        model: String,
        address: String,
        reason: String,
    },
}

/// A single registered model and the base address of its service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub base_address: String,
}

/// Read-only lookup table from model identifier to base address.
///
/// Lookups are hash-based; iteration follows registration order so
/// health reports and logs are reproducible. The table is shared as
/// `Arc<ModelRegistry>` and never mutated after construction, so
/// concurrent readers need no synchronization.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// Builds a registry from `(identifier, base address)` pairs.
    ///
    /// Base addresses must be absolute `http`/`https` URLs without a path,
    /// query or fragment. A trailing `/` is stripped.
    pub fn from_entries<I, N, A>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (N, A)>,
        N: Into<String>,
        A: AsRef<str>,
    {
        let mut registry = Self::default();

        for (name, address) in entries {
            let name = name.into();
            if name.is_empty() {
                return Err(RegistryError::EmptyIdentifier);
            }
            if registry.index.contains_key(&name) {
                return Err(RegistryError::DuplicateIdentifier(name));
            }

            let base_address = normalize_base_address(&name, address.as_ref())?;
            registry.index.insert(name.clone(), registry.entries.len());
            registry.entries.push(ModelEntry { name, base_address });
        }

        Ok(registry)
    }

    /// Returns the base address registered for `model`, if any.
    pub fn resolve(&self, model: &str) -> Option<&str> {
        self.index
            .get(model)
            .map(|&i| self.entries[i].base_address.as_str())
    }

    /// Returns whether `model` is registered.
    pub fn contains(&self, model: &str) -> bool {
        self.index.contains_key(model)
    }

    /// Returns all entries in registration order.
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Validates a base address and strips a single trailing slash.
fn normalize_base_address(model: &str, address: &str) -> Result<String, RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidAddress {
        model: model.to_string(),
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(address).map_err(|e| invalid(&e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("base address must not contain a path, query or fragment"));
    }

    Ok(address.strip_suffix('/').unwrap_or(address).to_string())
}
