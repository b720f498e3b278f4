//! Session manager.
//!
//! The [`Manager`] resolves a provider from a [`ProviderRegistry`], applies
//! configuration defaults, initializes the provider and then serves session
//! lifecycle calls for the life of the process. One manager per application
//! is the intended pattern.
//!
//! Cookies are the caller's job: the manager describes the cookie to emit
//! ([`Manager::session_cookie`]) but never writes one, and
//! [`SessionStore::release`] only persists backend state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{LegacyOption, ManagerConfig, SessionSettings};
use crate::error::{Result, TetherError};
use crate::identifier::{self, EntropySource, HashFunc, HashKey, OsEntropy};
use crate::registry::ProviderRegistry;
use crate::storage::{Provider, SessionStore};

/// A cookie the caller should emit for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value (the session id, or empty for a removal cookie).
    pub value: String,
    /// Cookie path, always `/`.
    pub path: String,
    /// Secure-only flag.
    pub secure: bool,
    /// HttpOnly flag, always set.
    pub http_only: bool,
    /// Max-Age attribute; `None` for a session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
}

impl SessionCookie {
    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![
            format!("{}={}", self.name, self.value),
            format!("Path={}", self.path),
        ];
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age));
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }
}

/// Orchestrates one provider and one configuration.
pub struct Manager {
    provider_name: String,
    provider: Arc<dyn Provider>,
    settings: SessionSettings,
    entropy: Arc<dyn EntropySource>,
}

impl Manager {
    /// Build a manager over the provider registered as `provider_name`.
    ///
    /// Fails with [`TetherError::UnknownProvider`] if the name is not
    /// registered, [`TetherError::InvalidConfiguration`] if the configuration
    /// does not resolve, and the fatal
    /// [`TetherError::BackendInitialization`] if the provider's `init` fails.
    pub fn new(
        registry: &ProviderRegistry,
        provider_name: &str,
        config: &ManagerConfig,
    ) -> Result<Self> {
        Self::with_entropy(registry, provider_name, config, Arc::new(OsEntropy))
    }

    /// Like [`Manager::new`] with an explicit random source.
    pub fn with_entropy(
        registry: &ProviderRegistry,
        provider_name: &str,
        config: &ManagerConfig,
        entropy: Arc<dyn EntropySource>,
    ) -> Result<Self> {
        let provider = registry
            .lookup(provider_name)
            .ok_or_else(|| TetherError::unknown_provider(provider_name))?;

        let settings = config.resolve(provider.default_cookie_name(), entropy.as_ref())?;

        provider
            .init(settings.gc_lifetime, &settings.provider_config)
            .map_err(|e| TetherError::backend_initialization(provider_name, e.to_string()))?;

        tracing::debug!(
            "session manager ready: provider={}, cookie={}, gclifetime={}, hash={}",
            provider_name,
            settings.cookie_name,
            settings.gc_lifetime,
            settings.hash_func
        );

        Ok(Self {
            provider_name: provider_name.to_string(),
            provider,
            settings,
            entropy,
        })
    }

    /// Build a manager from a JSON configuration document.
    pub fn from_json(registry: &ProviderRegistry, provider_name: &str, json: &str) -> Result<Self> {
        // Check the provider first so a bad name is reported as such even
        // when the document is also broken.
        if !registry.contains(provider_name) {
            return Err(TetherError::unknown_provider(provider_name));
        }
        let config = ManagerConfig::from_json(json)?;
        Self::new(registry, provider_name, &config)
    }

    /// Build a manager from a TOML configuration document.
    pub fn from_toml(
        registry: &ProviderRegistry,
        provider_name: &str,
        content: &str,
    ) -> Result<Self> {
        if !registry.contains(provider_name) {
            return Err(TetherError::unknown_provider(provider_name));
        }
        let config = ManagerConfig::from_toml(content)?;
        Self::new(registry, provider_name, &config)
    }

    /// Build a manager from the legacy positional arguments.
    ///
    /// See [`ManagerConfig::from_legacy`] for the option slots.
    pub fn from_legacy(
        registry: &ProviderRegistry,
        provider_name: &str,
        cookie_name: &str,
        max_lifetime: i64,
        save_path: &str,
        options: &[LegacyOption],
    ) -> Result<Self> {
        let config = ManagerConfig::from_legacy(cookie_name, max_lifetime, save_path, options)?;
        Self::new(registry, provider_name, &config)
    }

    /// Name the provider was registered under.
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// The resolved provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Effective settings.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Generate a fresh session identifier for `client_addr`.
    pub fn generate_session_id(&self, client_addr: &str) -> Result<String> {
        identifier::generate_session_id(
            client_addr,
            self.settings.hash_func,
            &self.settings.hash_key,
            self.entropy.as_ref(),
        )
    }

    /// Resume the session named by the request cookie, or start a new one.
    ///
    /// A missing, empty or unknown `cookie_sid` starts a new session under a
    /// freshly generated identifier.
    pub fn session_start(
        &self,
        client_addr: &str,
        cookie_sid: Option<&str>,
    ) -> Result<Box<dyn SessionStore>> {
        if let Some(sid) = cookie_sid.filter(|sid| !sid.is_empty()) {
            if self.provider.exists(sid) {
                return self.provider.read(sid);
            }
        }

        let sid = self.generate_session_id(client_addr)?;
        tracing::debug!("starting session {}", short_sid(&sid));
        self.provider.read(&sid)
    }

    /// Open an existing session.
    pub fn get_session_store(&self, sid: &str) -> Result<Box<dyn SessionStore>> {
        if !self.provider.exists(sid) {
            return Err(TetherError::session_not_found(sid));
        }
        self.provider.read(sid)
    }

    /// Move `old_sid` to a freshly generated identifier, keeping its data.
    pub fn session_regenerate_id(
        &self,
        client_addr: &str,
        old_sid: &str,
    ) -> Result<Box<dyn SessionStore>> {
        let sid = self.generate_session_id(client_addr)?;
        tracing::debug!(
            "regenerating session {} as {}",
            short_sid(old_sid),
            short_sid(&sid)
        );
        self.provider.regenerate(old_sid, &sid)
    }

    /// Destroy `sid` in the provider.
    pub fn session_destroy(&self, sid: &str) -> Result<()> {
        tracing::debug!("destroying session {}", short_sid(sid));
        self.provider.destroy(sid)
    }

    /// Run one garbage-collection sweep.
    pub fn gc(&self) {
        self.provider.gc();
    }

    /// Number of live sessions reported by the provider.
    pub fn get_active_session(&self) -> usize {
        self.provider.active_count()
    }

    /// Change the identifier hash function and key.
    ///
    /// Meant for startup tuning; `&mut self` keeps it from racing with
    /// identifier generation.
    pub fn set_hash_func(&mut self, func: HashFunc, key: impl Into<HashKey>) {
        self.settings.hash_func = func;
        self.settings.hash_key = key.into();
    }

    /// Change the secure-cookie flag.
    pub fn set_secure(&mut self, secure: bool) {
        self.settings.secure = secure;
    }

    /// The cookie to emit for `sid`, or `None` when automatic cookie
    /// emission is disabled.
    pub fn session_cookie(&self, sid: &str) -> Option<SessionCookie> {
        if !self.settings.enable_set_cookie {
            return None;
        }
        let max_age = (self.settings.max_age >= 0).then_some(self.settings.max_age);
        Some(self.cookie(sid, max_age))
    }

    /// A cookie that clears the session cookie in the user agent.
    pub fn removal_cookie(&self) -> SessionCookie {
        self.cookie("", Some(0))
    }

    fn cookie(&self, value: &str, max_age: Option<i64>) -> SessionCookie {
        SessionCookie {
            name: self.settings.cookie_name.clone(),
            value: value.to_string(),
            path: "/".to_string(),
            secure: self.settings.secure,
            http_only: true,
            max_age,
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("provider_name", &self.provider_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Leading characters of a session id, for logs.
fn short_sid(sid: &str) -> &str {
    sid.get(..8).unwrap_or(sid)
}
