//! Provider registry -- a named collection of available booking adapters.
//!
//! The registry lets the orchestrator look up providers by id at runtime
//! (a booking row stores the `provider_id` it was created through). It is
//! built once at startup and read-mostly afterwards.

use std::collections::HashMap;

use super::trait_def::Provider;

/// A collection of registered [`Provider`] implementations, keyed by id.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider adapter.
    ///
    /// The provider is stored under the id returned by [`Provider::id`].
    /// If a provider with the same id is already registered, it is
    /// replaced and the old one is returned.
    pub fn register(&mut self, provider: impl Provider + 'static) -> Option<Box<dyn Provider>> {
        let id = provider.id().to_string();
        self.providers.insert(id, Box::new(provider))
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<&dyn Provider> {
        self.providers.get(id).map(|b| b.as_ref())
    }

    /// List the ids of all registered providers.
    ///
    /// The order is not guaranteed (HashMap iteration order).
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(|s| s.as_str()).collect()
    }

    /// Iterate over all registered providers.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Provider> {
        self.providers.values().map(|b| b.as_ref())
    }

    /// Return the number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Return `true` if no providers are registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::static_provider::StaticProvider;

    #[test]
    fn registry_starts_empty() {
        let registry = ProviderRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.list().is_empty());
    }

    #[test]
    fn register_and_get() {
        let mut registry = ProviderRegistry::new();
        let old = registry.register(StaticProvider::new("alpha", "activity"));
        assert!(old.is_none());

        let provider = registry.get("alpha");
        assert!(provider.is_some());
        assert_eq!(provider.unwrap().id(), "alpha");
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = ProviderRegistry::new();
        registry.register(StaticProvider::new("alpha", "activity"));
        let old = registry.register(StaticProvider::new("alpha", "hotel"));
        assert!(old.is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("alpha").unwrap().provider_type(), "hotel");
    }

    #[test]
    fn get_missing_returns_none() {
        let registry = ProviderRegistry::new();
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn list_returns_all_ids() {
        let mut registry = ProviderRegistry::new();
        registry.register(StaticProvider::new("alpha", "activity"));
        registry.register(StaticProvider::new("beta", "hotel"));
        registry.register(StaticProvider::new("gamma", "transport"));

        let mut ids = registry.list();
        ids.sort();
        assert_eq!(ids, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn registry_debug_shows_ids() {
        let mut registry = ProviderRegistry::new();
        registry.register(StaticProvider::new("test-provider", "activity"));
        let debug = format!("{registry:?}");
        assert!(debug.contains("test-provider"));
    }
}
