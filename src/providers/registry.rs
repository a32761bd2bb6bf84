//! Provider registry: provider id -> provider, populated once at startup

use std::sync::Arc;

use tracing::debug;

use super::FileProvider;
use crate::errors::{NavError, NavResult};

/// Aggregate key that selects every registered provider
pub const ALL_PROVIDERS: &str = "all";

/// Registered providers in registration order
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn FileProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.iter().map(|p| p.id())).finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; a later registration with the same id replaces the earlier one
    pub fn register(&mut self, provider: Arc<dyn FileProvider>) {
        debug!(provider = provider.id(), "registering provider");
        if let Some(slot) = self.providers.iter_mut().find(|p| p.id() == provider.id()) {
            *slot = provider;
        } else {
            self.providers.push(provider);
        }
    }

    pub fn with(mut self, provider: Arc<dyn FileProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by id
    pub fn get(&self, id: &str) -> NavResult<&Arc<dyn FileProvider>> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| NavError::InvalidFileProvider(id.to_string()))
    }

    /// Providers selected by `filter`: one id, or every provider for [`ALL_PROVIDERS`]
    pub fn select(&self, filter: &str) -> NavResult<Vec<&Arc<dyn FileProvider>>> {
        if filter == ALL_PROVIDERS || filter.is_empty() {
            Ok(self.providers.iter().collect())
        } else {
            Ok(vec![self.get(filter)?])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FileProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MemoryRepository, RepositoryProvider};

    #[test]
    fn test_lookup_and_all() {
        let repo = Arc::new(RepositoryProvider::new(Arc::new(MemoryRepository::new())));
        let registry = ProviderRegistry::new().with(repo);

        assert!(registry.get("repository").is_ok());
        assert!(matches!(registry.get("nope"), Err(NavError::InvalidFileProvider(id)) if id == "nope"));
        assert_eq!(registry.select(ALL_PROVIDERS).unwrap().len(), 1);
    }
}
