//! Provider registry for Tether.
//!
//! Maps backend names to provider instances. Registration is meant to happen
//! once, during single-threaded startup, before any request is served; the
//! map is lock-guarded so a late registration is safe, but registering while
//! managers are already being built is a configuration bug and lookups made
//! before it will not see the new provider.
//!
//! Duplicate names and missing providers are rejected with fatal errors (see
//! [`TetherError::is_fatal`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::error::{Result, TetherError};
use crate::storage::{FileProvider, MemoryProvider, Provider};

/// Table of named providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in `memory` and `file` providers.
    pub fn with_builtin() -> Result<Self> {
        let registry = Self::new();
        register_builtin_providers(&registry)?;
        Ok(registry)
    }

    /// Register `provider` under `name`.
    ///
    /// Fails with [`TetherError::NilProvider`] when `provider` is `None` and
    /// with [`TetherError::DuplicateProvider`] when `name` is taken. Both are
    /// fatal.
    pub fn register(&self, name: &str, provider: Option<Arc<dyn Provider>>) -> Result<()> {
        let Some(provider) = provider else {
            return Err(TetherError::nil_provider(name));
        };

        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if providers.contains_key(name) {
            return Err(TetherError::duplicate_provider(name));
        }

        tracing::debug!("registered session provider '{}'", name);
        providers.insert(name.to_string(), provider);
        Ok(())
    }

    /// Look up the provider registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Check whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Register the built-in providers into `registry`.
pub fn register_builtin_providers(registry: &ProviderRegistry) -> Result<()> {
    registry.register("memory", Some(Arc::new(MemoryProvider::new())))?;
    registry.register("file", Some(Arc::new(FileProvider::new())))?;
    Ok(())
}

/// The process-wide registry, created on first use with no providers.
pub fn global() -> &'static ProviderRegistry {
    static GLOBAL: OnceLock<ProviderRegistry> = OnceLock::new();
    GLOBAL.get_or_init(ProviderRegistry::new)
}

/// Register `provider` under `name` in the process-wide registry.
pub fn register(name: &str, provider: Option<Arc<dyn Provider>>) -> Result<()> {
    global().register(name, provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Option<Arc<dyn Provider>> {
        Some(Arc::new(MemoryProvider::new()))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ProviderRegistry::new();
        registry.register("memory", memory()).unwrap();

        let provider = registry.lookup("memory").unwrap();
        assert_eq!(provider.name(), "memory");
        assert!(registry.contains("memory"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = ProviderRegistry::new();
        assert!(registry.lookup("redis").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = ProviderRegistry::new();
        registry.register("memory", memory()).unwrap();

        let err = registry.register("memory", memory()).unwrap_err();
        assert!(matches!(err, TetherError::DuplicateProvider { ref name } if name == "memory"));
        assert!(err.is_fatal());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_nil_provider_fails() {
        let registry = ProviderRegistry::new();

        let err = registry.register("ghost", None).unwrap_err();
        assert!(matches!(err, TetherError::NilProvider { .. }));
        assert!(err.is_fatal());
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn test_lookup_returns_shared_instance() {
        let registry = ProviderRegistry::new();
        registry.register("memory", memory()).unwrap();

        let a = registry.lookup("memory").unwrap();
        let b = registry.lookup("memory").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_with_builtin() {
        let registry = ProviderRegistry::with_builtin().unwrap();
        assert_eq!(registry.names(), vec!["file", "memory"]);
        assert!(register_builtin_providers(&registry).is_err());
    }

    #[test]
    fn test_global_registry() {
        register("global-test-provider", memory()).unwrap();
        assert!(global().contains("global-test-provider"));
        assert!(register("global-test-provider", memory()).is_err());
    }

    #[test]
    fn test_debug_lists_names() {
        let registry = ProviderRegistry::with_builtin().unwrap();
        let debug = format!("{:?}", registry);
        assert!(debug.contains("file"));
        assert!(debug.contains("memory"));
    }
}
