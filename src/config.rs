//! Configuration loading for Tether.
//!
//! A manager is configured from a [`ManagerConfig`], whose fields are all
//! optional. It can be parsed from JSON or TOML (same field names), built by
//! the legacy positional adapter ([`ManagerConfig::from_legacy`]), or filled
//! in by hand. Precedence when loading from a file:
//! 1. Environment variables (highest priority)
//! 2. The configuration file
//! 3. Defaults (lowest priority)
//!
//! [`ManagerConfig::resolve`] turns it into the fully defaulted
//! [`SessionSettings`] the manager runs with.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TetherError};
use crate::identifier::{EntropySource, HashFunc, HashKey, DEFAULT_KEY_LEN};

/// Max-age meaning "session cookie": expires with the user agent.
pub const SESSION_COOKIE_MAX_AGE: i64 = -1;

/// Raw manager configuration.
///
/// Field names follow the historical JSON document (`cookieName`,
/// `gclifetime`, `sessionIDHashFunc`, ...). Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Name of the cookie carrying the session id. Defaults per provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
    /// Whether the caller should emit the cookie automatically. Default true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_set_cookie: Option<bool>,
    /// Seconds an idle session lives before backend GC. Required.
    #[serde(rename = "gclifetime", skip_serializing_if = "Option::is_none")]
    pub gc_lifetime: Option<i64>,
    /// Cookie max-age. Absent means session cookie, negative means expire now.
    #[serde(rename = "maxage", skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    /// Mark the cookie secure-only. Default false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    /// Identifier hash selector, `sha1` (default) or `md5`.
    #[serde(rename = "sessionIDHashFunc", skip_serializing_if = "Option::is_none")]
    pub session_id_hash_func: Option<String>,
    /// HMAC key. Defaults to 16 fresh random bytes.
    #[serde(rename = "sessionIDHashKey", skip_serializing_if = "Option::is_none")]
    pub session_id_hash_key: Option<String>,
    /// Alternate lifetime field, interpreted by backends that want it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_life_time: Option<i64>,
    /// Opaque string handed to the provider's `init`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<String>,
}

/// Effective settings after defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Cookie name.
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
    /// Identifier HMAC key.
    pub hash_key: HashKey,
    /// Alternate lifetime, if configured.
    pub cookie_life_time: Option<i64>,
    /// Opaque provider configuration.
    pub provider_config: String,
}

/// Normalize a configured max-age.
///
/// Positive values are kept, negative values become 0 (expire immediately)
/// and an absent value becomes [`SESSION_COOKIE_MAX_AGE`].
pub fn normalize_max_age(max_age: Option<i64>) -> i64 {
    match max_age {
        None => SESSION_COOKIE_MAX_AGE,
        Some(n) if n < 0 => 0,
        Some(n) => n,
    }
}

/// Check a cookie name against the RFC 6265 token grammar.
pub fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic()
                && !matches!(
                    b,
                    b'(' | b')'
                        | b'<'
                        | b'>'
                        | b'@'
                        | b','
                        | b';'
                        | b':'
                        | b'\\'
                        | b'"'
                        | b'/'
                        | b'['
                        | b']'
                        | b'?'
                        | b'='
                        | b'{'
                        | b'}'
                )
        })
}

/// A positional option of the legacy constructor.
///
/// Slots, in order: secure flag (bool), hash function (string), hash key
/// (string), max-age (integer).
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyOption {
    Bool(bool),
    Str(String),
    Int(i64),
}

impl LegacyOption {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
        }
    }
}

impl From<bool> for LegacyOption {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for LegacyOption {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for LegacyOption {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for LegacyOption {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for LegacyOption {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

const LEGACY_SLOTS: [(&str, &str); 4] = [
    ("secure", "bool"),
    ("hash function", "string"),
    ("hash key", "string"),
    ("max-age", "integer"),
];

fn legacy_mismatch(slot: usize, option: &LegacyOption) -> TetherError {
    let (name, expected) = LEGACY_SLOTS[slot];
    TetherError::invalid_configuration(format!(
        "option {} ({}) must be {}, got {}",
        slot + 1,
        name,
        expected,
        option.kind()
    ))
}

impl ManagerConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TetherError::invalid_configuration(e.to_string()))
    }

    /// Parse a TOML configuration document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| TetherError::invalid_configuration(e.to_string()))
    }

    /// Load a configuration file, choosing the format by extension, then
    /// apply environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| TetherError::storage(path, e))?;
        let mut config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content)?,
            Some("toml") => Self::from_toml(&content)?,
            _ => {
                return Err(TetherError::invalid_configuration(format!(
                    "unsupported config format: {} (expected .json or .toml)",
                    path.display()
                )))
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Build a configuration from the legacy positional arguments.
    ///
    /// Each option must have the type of its slot; a mismatch or a fifth
    /// option is a caller bug and reported as invalid configuration.
    pub fn from_legacy(
        cookie_name: &str,
        max_lifetime: i64,
        save_path: &str,
        options: &[LegacyOption],
    ) -> Result<Self> {
        if options.len() > LEGACY_SLOTS.len() {
            return Err(TetherError::invalid_configuration(format!(
                "expected at most {} options, got {}",
                LEGACY_SLOTS.len(),
                options.len()
            )));
        }

        let mut config = Self {
            cookie_name: Some(cookie_name.to_string()),
            gc_lifetime: Some(max_lifetime),
            provider_config: Some(save_path.to_string()),
            ..Self::default()
        };

        for (slot, option) in options.iter().enumerate() {
            match (slot, option) {
                (0, LegacyOption::Bool(secure)) => config.secure = Some(*secure),
                (1, LegacyOption::Str(func)) => config.session_id_hash_func = Some(func.clone()),
                (2, LegacyOption::Str(key)) => config.session_id_hash_key = Some(key.clone()),
                (3, LegacyOption::Int(max_age)) => config.max_age = Some(*max_age),
                _ => return Err(legacy_mismatch(slot, option)),
            }
        }

        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        // TETHER_COOKIE_NAME
        if let Ok(val) = env::var("TETHER_COOKIE_NAME") {
            if is_valid_cookie_name(&val) {
                self.cookie_name = Some(val);
            } else {
                tracing::warn!("Invalid TETHER_COOKIE_NAME value '{}', ignoring", val);
            }
        }

        // TETHER_GC_LIFETIME
        if let Ok(val) = env::var("TETHER_GC_LIFETIME") {
            match val.parse::<i64>() {
                Ok(n) if n >= 0 => self.gc_lifetime = Some(n),
                _ => tracing::warn!(
                    "Invalid TETHER_GC_LIFETIME value '{}'. Expected seconds >= 0, ignoring",
                    val
                ),
            }
        }

        // TETHER_MAX_AGE
        if let Ok(val) = env::var("TETHER_MAX_AGE") {
            match val.parse::<i64>() {
                Ok(n) => self.max_age = Some(n),
                Err(_) => tracing::warn!(
                    "Invalid TETHER_MAX_AGE value '{}'. Expected an integer, ignoring",
                    val
                ),
            }
        }

        // TETHER_SECURE
        if let Ok(val) = env::var("TETHER_SECURE") {
            self.secure = Some(val == "true" || val == "1");
        }

        // TETHER_HASH_FUNC
        if let Ok(val) = env::var("TETHER_HASH_FUNC") {
            match HashFunc::parse(&val) {
                Some(func) => self.session_id_hash_func = Some(func.as_str().to_string()),
                None => tracing::warn!(
                    "Invalid TETHER_HASH_FUNC value '{}'. Valid values: sha1, md5, ignoring",
                    val
                ),
            }
        }

        // TETHER_PROVIDER_CONFIG
        if let Ok(val) = env::var("TETHER_PROVIDER_CONFIG") {
            self.provider_config = Some(val);
        }
    }

    /// Apply defaults and validate.
    ///
    /// `default_cookie_name` comes from the provider. A missing hash key is
    /// drawn from `entropy`, so this fails if the random source does.
    pub fn resolve(
        &self,
        default_cookie_name: &str,
        entropy: &dyn EntropySource,
    ) -> Result<SessionSettings> {
        let gc_lifetime = self
            .gc_lifetime
            .ok_or_else(|| TetherError::invalid_configuration("missing field `gclifetime`"))?;
        if gc_lifetime < 0 {
            return Err(TetherError::invalid_configuration(format!(
                "gclifetime must be >= 0, got {}",
                gc_lifetime
            )));
        }

        let cookie_name = match self.cookie_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => default_cookie_name.to_string(),
        };
        if !is_valid_cookie_name(&cookie_name) {
            return Err(TetherError::invalid_configuration(format!(
                "invalid cookie name {:?}",
                cookie_name
            )));
        }

        let hash_func = HashFunc::from_selector(self.session_id_hash_func.as_deref().unwrap_or(""));

        let hash_key = match self.session_id_hash_key.as_deref() {
            Some(key) if !key.is_empty() => HashKey::from(key),
            _ => HashKey::generate(entropy, DEFAULT_KEY_LEN)?,
        };

        Ok(SessionSettings {
            cookie_name,
            enable_set_cookie: self.enable_set_cookie.unwrap_or(true),
            gc_lifetime,
            max_age: normalize_max_age(self.max_age),
            secure: self.secure.unwrap_or(false),
            hash_func,
            hash_key,
            cookie_life_time: self.cookie_life_time,
            provider_config: self.provider_config.clone().unwrap_or_default(),
        })
    }
}

/// Get the Tether home directory.
///
/// Returns `$TETHER_HOME` if set and non-empty, otherwise `~/.tether`.
pub fn tether_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("TETHER_HOME") {
        if home.is_empty() {
            tracing::warn!("TETHER_HOME is empty, using default");
        } else {
            return Some(PathBuf::from(home));
        }
    }

    dirs::home_dir().map(|home| home.join(".tether"))
}

/// Get the default file-provider directory.
///
/// Returns `<tether_home>/sessions/`.
pub fn sessions_dir() -> Option<PathBuf> {
    tether_home().map(|h| h.join("sessions"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::tests::BrokenEntropy;
    use crate::identifier::OsEntropy;
    use proptest::prelude::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "TETHER_COOKIE_NAME",
        "TETHER_GC_LIFETIME",
        "TETHER_MAX_AGE",
        "TETHER_SECURE",
        "TETHER_HASH_FUNC",
        "TETHER_PROVIDER_CONFIG",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    fn resolve(config: &ManagerConfig) -> SessionSettings {
        config.resolve("tethersessionid", &OsEntropy).unwrap()
    }

    #[test]
    fn test_from_json_full() {
        let config = ManagerConfig::from_json(
            r#"{
                "cookieName": "sid",
                "enableSetCookie": false,
                "gclifetime": 3600,
                "maxage": 120,
                "secure": true,
                "sessionIDHashFunc": "md5",
                "sessionIDHashKey": "server-key",
                "cookieLifeTime": 7200,
                "providerConfig": "/var/lib/sessions"
            }"#,
        )
        .unwrap();

        assert_eq!(config.cookie_name.as_deref(), Some("sid"));
        assert_eq!(config.enable_set_cookie, Some(false));
        assert_eq!(config.gc_lifetime, Some(3600));
        assert_eq!(config.max_age, Some(120));
        assert_eq!(config.secure, Some(true));
        assert_eq!(config.session_id_hash_func.as_deref(), Some("md5"));
        assert_eq!(config.session_id_hash_key.as_deref(), Some("server-key"));
        assert_eq!(config.cookie_life_time, Some(7200));
        assert_eq!(config.provider_config.as_deref(), Some("/var/lib/sessions"));

        let settings = resolve(&config);
        assert_eq!(settings.hash_func, HashFunc::Md5);
        assert_eq!(settings.hash_key, HashKey::from("server-key"));
        assert!(!settings.enable_set_cookie);
        assert_eq!(settings.max_age, 120);
    }

    #[test]
    fn test_from_json_ignores_unknown_fields() {
        let config = ManagerConfig::from_json(r#"{"gclifetime": 10, "hashfunc": "md5"}"#).unwrap();
        assert_eq!(config.gc_lifetime, Some(10));
        assert!(config.session_id_hash_func.is_none());
    }

    #[test]
    fn test_from_json_malformed() {
        let err = ManagerConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, TetherError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_from_json_mistyped_field() {
        let err = ManagerConfig::from_json(r#"{"gclifetime": "an hour"}"#).unwrap_err();
        assert!(matches!(err, TetherError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_from_toml() {
        let config = ManagerConfig::from_toml(
            r#"
cookieName = "sid"
gclifetime = 600
sessionIDHashFunc = "md5"
"#,
        )
        .unwrap();
        assert_eq!(config.cookie_name.as_deref(), Some("sid"));
        assert_eq!(config.gc_lifetime, Some(600));
        assert_eq!(config.session_id_hash_func.as_deref(), Some("md5"));
    }

    #[test]
    fn test_from_toml_invalid() {
        let err = ManagerConfig::from_toml("gclifetime = [").unwrap_err();
        assert!(matches!(err, TetherError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ManagerConfig {
            gc_lifetime: Some(3600),
            ..Default::default()
        };
        let settings = resolve(&config);

        assert_eq!(settings.cookie_name, "tethersessionid");
        assert!(settings.enable_set_cookie);
        assert_eq!(settings.gc_lifetime, 3600);
        assert_eq!(settings.max_age, SESSION_COOKIE_MAX_AGE);
        assert!(!settings.secure);
        assert_eq!(settings.hash_func, HashFunc::Sha1);
        assert_eq!(settings.hash_key.len(), 16);
        assert_eq!(settings.cookie_life_time, None);
        assert_eq!(settings.provider_config, "");
    }

    #[test]
    fn test_resolve_generates_distinct_keys() {
        let config = ManagerConfig {
            gc_lifetime: Some(60),
            session_id_hash_key: Some(String::new()),
            ..Default::default()
        };
        let a = resolve(&config);
        let b = resolve(&config);
        assert_eq!(a.hash_key.len(), 16);
        assert_eq!(b.hash_key.len(), 16);
        assert_ne!(a.hash_key, b.hash_key);
    }

    #[test]
    fn test_resolve_key_generation_failure() {
        let config = ManagerConfig {
            gc_lifetime: Some(60),
            ..Default::default()
        };
        let err = config.resolve("sid", &BrokenEntropy).unwrap_err();
        assert!(matches!(err, TetherError::IdentifierGeneration { .. }));
    }

    #[test]
    fn test_resolve_requires_gc_lifetime() {
        let err = ManagerConfig::default()
            .resolve("sid", &OsEntropy)
            .unwrap_err();
        assert!(err.to_string().contains("gclifetime"));

        let negative = ManagerConfig {
            gc_lifetime: Some(-5),
            ..Default::default()
        };
        assert!(negative.resolve("sid", &OsEntropy).is_err());
    }

    #[test]
    fn test_resolve_rejects_bad_cookie_name() {
        let config = ManagerConfig {
            gc_lifetime: Some(60),
            cookie_name: Some("bad name;".to_string()),
            ..Default::default()
        };
        let err = config.resolve("sid", &OsEntropy).unwrap_err();
        assert!(matches!(err, TetherError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_unknown_hash_func_resolves_to_sha1() {
        let config = ManagerConfig {
            gc_lifetime: Some(60),
            session_id_hash_func: Some("blake3".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve(&config).hash_func, HashFunc::Sha1);
    }

    #[test]
    fn test_normalize_max_age() {
        assert_eq!(normalize_max_age(Some(5)), 5);
        assert_eq!(normalize_max_age(Some(-3)), 0);
        assert_eq!(normalize_max_age(Some(0)), 0);
        assert_eq!(normalize_max_age(None), -1);
    }

    #[test]
    fn test_is_valid_cookie_name() {
        assert!(is_valid_cookie_name("tethersessionid"));
        assert!(is_valid_cookie_name("__Host-sid"));
        assert!(!is_valid_cookie_name(""));
        assert!(!is_valid_cookie_name("a b"));
        assert!(!is_valid_cookie_name("a=b"));
        assert!(!is_valid_cookie_name("a;b"));
    }

    #[test]
    fn test_legacy_all_options() {
        let config = ManagerConfig::from_legacy(
            "sid",
            3600,
            "/tmp/sessions",
            &[true.into(), "md5".into(), "legacy-key".into(), LegacyOption::Int(5)],
        )
        .unwrap();

        assert_eq!(config.cookie_name.as_deref(), Some("sid"));
        assert_eq!(config.gc_lifetime, Some(3600));
        assert_eq!(config.provider_config.as_deref(), Some("/tmp/sessions"));
        assert_eq!(config.secure, Some(true));
        assert_eq!(config.session_id_hash_func.as_deref(), Some("md5"));
        assert_eq!(config.session_id_hash_key.as_deref(), Some("legacy-key"));

        let settings = resolve(&config);
        assert_eq!(settings.max_age, 5);
        assert!(settings.enable_set_cookie);
    }

    #[test]
    fn test_legacy_max_age_semantics() {
        let opts = |max_age: Option<i64>| {
            let mut options: Vec<LegacyOption> = vec![false.into(), "sha1".into(), "k".into()];
            if let Some(n) = max_age {
                options.push(n.into());
            }
            let config = ManagerConfig::from_legacy("sid", 60, "", &options).unwrap();
            resolve(&config).max_age
        };

        assert_eq!(opts(Some(5)), 5);
        assert_eq!(opts(Some(-3)), 0);
        assert_eq!(opts(None), -1);
    }

    #[test]
    fn test_legacy_no_options() {
        let config = ManagerConfig::from_legacy("sid", 60, "", &[]).unwrap();
        let settings = resolve(&config);
        assert!(!settings.secure);
        assert_eq!(settings.hash_func, HashFunc::Sha1);
        assert_eq!(settings.hash_key.len(), 16);
        assert_eq!(settings.max_age, -1);
    }

    #[test]
    fn test_legacy_wrong_type_is_rejected() {
        let err = ManagerConfig::from_legacy("sid", 60, "", &["yes".into()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: option 1 (secure) must be bool, got string"
        );

        let err = ManagerConfig::from_legacy(
            "sid",
            60,
            "",
            &[false.into(), "sha1".into(), "k".into(), "5".into()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("max-age"));
    }

    #[test]
    fn test_legacy_too_many_options() {
        let options: Vec<LegacyOption> = vec![
            false.into(),
            "sha1".into(),
            "k".into(),
            LegacyOption::Int(5),
            LegacyOption::Int(6),
        ];
        let err = ManagerConfig::from_legacy("sid", 60, "", &options).unwrap_err();
        assert!(matches!(err, TetherError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_load_from_file_json_and_toml() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("session.json");
        fs::write(&json_path, r#"{"gclifetime": 30}"#).unwrap();
        let toml_path = dir.path().join("session.toml");
        fs::write(&toml_path, "gclifetime = 40\n").unwrap();

        assert_eq!(
            ManagerConfig::load_from_file(&json_path).unwrap().gc_lifetime,
            Some(30)
        );
        assert_eq!(
            ManagerConfig::load_from_file(&toml_path).unwrap().gc_lifetime,
            Some(40)
        );
    }

    #[test]
    fn test_load_from_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = ManagerConfig::load_from_file(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(TetherError::Storage { .. })));

        let yaml = dir.path().join("session.yaml");
        fs::write(&yaml, "gclifetime: 1").unwrap();
        let err = ManagerConfig::load_from_file(&yaml).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        env::set_var("TETHER_COOKIE_NAME", "envsid");
        env::set_var("TETHER_GC_LIFETIME", "900");
        env::set_var("TETHER_MAX_AGE", "-10");
        env::set_var("TETHER_SECURE", "1");
        env::set_var("TETHER_HASH_FUNC", "md5");
        env::set_var("TETHER_PROVIDER_CONFIG", "/srv/sessions");

        let mut config = ManagerConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.cookie_name.as_deref(), Some("envsid"));
        assert_eq!(config.gc_lifetime, Some(900));
        assert_eq!(config.max_age, Some(-10));
        assert_eq!(config.secure, Some(true));
        assert_eq!(config.session_id_hash_func.as_deref(), Some("md5"));
        assert_eq!(config.provider_config.as_deref(), Some("/srv/sessions"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_overrides_ignored() {
        clear_env();
        env::set_var("TETHER_COOKIE_NAME", "has space");
        env::set_var("TETHER_GC_LIFETIME", "-1");
        env::set_var("TETHER_MAX_AGE", "soon");
        env::set_var("TETHER_HASH_FUNC", "sha512");

        let mut config = ManagerConfig {
            cookie_name: Some("sid".to_string()),
            gc_lifetime: Some(60),
            ..Default::default()
        };
        config.apply_env_overrides();

        assert_eq!(config.cookie_name.as_deref(), Some("sid"));
        assert_eq!(config.gc_lifetime, Some(60));
        assert_eq!(config.max_age, None);
        assert_eq!(config.session_id_hash_func, None);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_overrides_beat_file() {
        clear_env();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"gclifetime": 30, "secure": false}"#).unwrap();
        env::set_var("TETHER_SECURE", "true");

        let config = ManagerConfig::load_from_file(&path).unwrap();
        assert_eq!(config.secure, Some(true));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_tether_home_with_env() {
        env::set_var("TETHER_HOME", "/custom/tether");
        assert_eq!(tether_home(), Some(PathBuf::from("/custom/tether")));
        assert_eq!(sessions_dir(), Some(PathBuf::from("/custom/tether/sessions")));
        env::remove_var("TETHER_HOME");
    }

    #[test]
    #[serial]
    fn test_tether_home_empty_env() {
        env::set_var("TETHER_HOME", "");
        let home = tether_home();
        if let Some(path) = home {
            assert!(path.ends_with(".tether"));
        }
        env::remove_var("TETHER_HOME");
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let config = ManagerConfig {
            gc_lifetime: Some(60),
            session_id_hash_func: Some("md5".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"gclifetime":60,"sessionIDHashFunc":"md5"}"#);
    }

    proptest! {
        #[test]
        fn prop_normalized_max_age_is_never_below_session_sentinel(n in any::<i64>()) {
            let normalized = normalize_max_age(Some(n));
            prop_assert!(normalized >= 0);
            if n > 0 {
                prop_assert_eq!(normalized, n);
            }
        }
    }
}
