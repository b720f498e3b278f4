//! Config command for Tether.
//!
//! Loads a configuration file, applies environment overrides and defaults,
//! and shows the settings a manager would run with. The hash key is shown
//! only by length.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ManagerConfig, SessionSettings};
use crate::error::{Result, TetherError};
use crate::identifier::{HashFunc, OsEntropy};
use crate::registry::ProviderRegistry;

/// Options for the config command.
#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// Configuration file (`.json` or `.toml`).
    pub path: PathBuf,
    /// Provider the settings are resolved for.
    pub provider: String,
}

/// Effective settings, safe to print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveSettings {
    /// Provider the settings were resolved for.
    pub provider: String,
    /// Cookie name, after the provider default is applied.
    pub cookie_name: String,
    /// Whether the caller should emit the cookie automatically.
    pub enable_set_cookie: bool,
    /// GC lifetime in seconds.
    pub gc_lifetime: i64,
    /// Normalized max-age: -1 session cookie, 0 expire now, >0 seconds.
    pub max_age: i64,
    /// Secure-only cookie.
    pub secure: bool,
    /// Identifier hash function.
    pub hash_func: HashFunc,
    /// Length of the HMAC key in bytes. The key itself is never shown.
    pub hash_key_len: usize,
    /// Alternate lifetime, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_life_time: Option<i64>,
    /// Opaque provider configuration.
    pub provider_config: String,
}

impl EffectiveSettings {
    fn new(provider: &str, settings: &SessionSettings) -> Self {
        Self {
            provider: provider.to_string(),
            cookie_name: settings.cookie_name.clone(),
            enable_set_cookie: settings.enable_set_cookie,
            gc_lifetime: settings.gc_lifetime,
            max_age: settings.max_age,
            secure: settings.secure,
            hash_func: settings.hash_func,
            hash_key_len: settings.hash_key.len(),
            cookie_life_time: settings.cookie_life_time,
            provider_config: settings.provider_config.clone(),
        }
    }
}

/// Output format for the config command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Resolved settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<EffectiveSettings>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the error must stop a server from starting.
    #[serde(default)]
    pub fatal: bool,
}

impl ConfigOutput {
    /// Create a successful output.
    pub fn success(settings: EffectiveSettings) -> Self {
        Self {
            success: true,
            settings: Some(settings),
            error: None,
            fatal: false,
        }
    }

    /// Create a failed output.
    pub fn failure(error: &TetherError) -> Self {
        Self {
            success: false,
            settings: None,
            error: Some(error.to_string()),
            fatal: error.is_fatal(),
        }
    }

    /// Format as human-readable text.
    pub fn format_text(&self) -> String {
        let Some(s) = self.settings.as_ref().filter(|_| self.success) else {
            return format!(
                "Config failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        };

        let max_age = match s.max_age {
            -1 => "session cookie".to_string(),
            0 => "expire immediately".to_string(),
            n => format!("{}s", n),
        };

        let mut lines = vec![
            format!("provider:          {}", s.provider),
            format!("cookie name:       {}", s.cookie_name),
            format!("set cookie:        {}", s.enable_set_cookie),
            format!("gc lifetime:       {}s", s.gc_lifetime),
            format!("max-age:           {}", max_age),
            format!("secure:            {}", s.secure),
            format!("hash function:     {}", s.hash_func),
            format!("hash key:          <{} bytes>", s.hash_key_len),
        ];
        if let Some(lifetime) = s.cookie_life_time {
            lines.push(format!("cookie lifetime:   {}s", lifetime));
        }
        lines.push(format!("provider config:   {:?}", s.provider_config));
        lines.join("\n")
    }
}

/// The config command implementation.
pub struct ConfigCommand<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> ConfigCommand<'a> {
    /// Create a new config command.
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Run the config command.
    pub fn run(&self, options: &ConfigOptions) -> ConfigOutput {
        match self.resolve(options) {
            Ok(settings) => ConfigOutput::success(settings),
            Err(e) => ConfigOutput::failure(&e),
        }
    }

    fn resolve(&self, options: &ConfigOptions) -> Result<EffectiveSettings> {
        let provider = self
            .registry
            .lookup(&options.provider)
            .ok_or_else(|| TetherError::unknown_provider(&options.provider))?;
        let config = ManagerConfig::load_from_file(&options.path)?;
        let settings = config.resolve(provider.default_cookie_name(), &OsEntropy)?;
        Ok(EffectiveSettings::new(&options.provider, &settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn run(content: &str, file: &str, provider: &str) -> ConfigOutput {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(file);
        fs::write(&path, content).unwrap();
        let registry = ProviderRegistry::with_builtin().unwrap();
        ConfigCommand::new(&registry).run(&ConfigOptions {
            path,
            provider: provider.to_string(),
        })
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        let output = run(r#"{"gclifetime": 3600}"#, "session.json", "memory");
        assert!(output.success);

        let settings = output.settings.as_ref().unwrap();
        assert_eq!(settings.cookie_name, "tethersessionid");
        assert_eq!(settings.hash_func, HashFunc::Sha1);
        assert_eq!(settings.hash_key_len, 16);
        assert_eq!(settings.max_age, -1);

        let text = output.format_text();
        assert!(text.contains("session cookie"));
        assert!(text.contains("<16 bytes>"));
    }

    #[test]
    #[serial]
    fn test_config_toml() {
        let output = run(
            "gclifetime = 60\nmaxage = -4\nsessionIDHashKey = \"abc\"\n",
            "session.toml",
            "file",
        );
        let settings = output.settings.unwrap();
        assert_eq!(settings.provider, "file");
        assert_eq!(settings.max_age, 0);
        assert_eq!(settings.hash_key_len, 3);
    }

    #[test]
    #[serial]
    fn test_config_unknown_provider() {
        let output = run(r#"{"gclifetime": 60}"#, "session.json", "redis");
        assert!(!output.success);
        assert!(!output.fatal);
        assert!(output.format_text().contains("unknown provider"));
    }

    #[test]
    #[serial]
    fn test_config_invalid() {
        let output = run(r#"{"cookieName": "sid"}"#, "session.json", "memory");
        assert!(!output.success);
        assert!(output.error.unwrap().contains("gclifetime"));
    }

    #[test]
    fn test_config_output_hides_key() {
        let settings = EffectiveSettings {
            provider: "memory".to_string(),
            cookie_name: "sid".to_string(),
            enable_set_cookie: true,
            gc_lifetime: 60,
            max_age: 300,
            secure: true,
            hash_func: HashFunc::Md5,
            hash_key_len: 9,
            cookie_life_time: Some(10),
            provider_config: String::new(),
        };
        let json = serde_json::to_string(&ConfigOutput::success(settings)).unwrap();
        assert!(json.contains("\"hash_key_len\":9"));
        assert!(json.contains("\"hash_func\":\"md5\""));
    }
}
