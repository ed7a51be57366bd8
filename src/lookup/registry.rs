// src/lookup/registry.rs
//! Source-key → lookup-capability map, built once at startup and passed
//! explicitly into the dispatcher. No process-global state; an unknown key
//! resolves to None and becomes the caller's typed error.

use std::collections::HashMap;
use std::sync::Arc;

use super::PriceLookup;

#[derive(Default)]
pub struct SourceRegistry {
    providers: HashMap<String, Arc<dyn PriceLookup>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability under its own key. A later registration for
    /// the same key replaces the earlier one.
    pub fn register(&mut self, provider: Arc<dyn PriceLookup>) {
        self.providers.insert(provider.key().to_string(), provider);
    }

    pub fn resolve(&self, source_key: &str) -> Option<Arc<dyn PriceLookup>> {
        self.providers.get(source_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
