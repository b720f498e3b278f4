//! Id command for Tether.
//!
//! Generates session identifiers the same way a manager would, which is
//! handy for load tests and for checking hash settings.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifier::{
    generate_session_id, EntropySource, HashFunc, HashKey, OsEntropy, DEFAULT_KEY_LEN,
};

/// Options for the id command.
#[derive(Debug, Clone)]
pub struct IdOptions {
    /// Client address mixed into the signature.
    pub addr: String,
    /// Hash function.
    pub hash_func: HashFunc,
    /// HMAC key; a random key is drawn when absent.
    pub key: Option<String>,
    /// Number of identifiers to generate.
    pub count: usize,
}

impl Default for IdOptions {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            hash_func: HashFunc::default(),
            key: None,
            count: 1,
        }
    }
}

/// Output format for the id command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdOutput {
    /// Whether the command was successful.
    pub success: bool,
    /// Hash function used.
    pub hash_func: HashFunc,
    /// Generated identifiers.
    pub ids: Vec<String>,
    /// Error message if command failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IdOutput {
    /// Create a successful output.
    pub fn success(hash_func: HashFunc, ids: Vec<String>) -> Self {
        Self {
            success: true,
            hash_func,
            ids,
            error: None,
        }
    }

    /// Create a failed output.
    pub fn failure(hash_func: HashFunc, error: impl Into<String>) -> Self {
        Self {
            success: false,
            hash_func,
            ids: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Format as human-readable text.
    pub fn format_text(&self) -> String {
        if !self.success {
            return format!(
                "Id generation failed: {}",
                self.error.as_deref().unwrap_or("unknown error")
            );
        }
        self.ids.join("\n")
    }
}

/// The id command implementation.
pub struct IdCommand<E: EntropySource = OsEntropy> {
    entropy: E,
}

impl IdCommand<OsEntropy> {
    /// Create a new id command backed by OS randomness.
    pub fn new() -> Self {
        Self { entropy: OsEntropy }
    }
}

impl Default for IdCommand<OsEntropy> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntropySource> IdCommand<E> {
    /// Create an id command with a specific random source.
    pub fn with_entropy(entropy: E) -> Self {
        Self { entropy }
    }

    /// Run the id command.
    pub fn run(&self, options: &IdOptions) -> IdOutput {
        match self.generate(options) {
            Ok(ids) => IdOutput::success(options.hash_func, ids),
            Err(e) => IdOutput::failure(options.hash_func, e.to_string()),
        }
    }

    fn generate(&self, options: &IdOptions) -> Result<Vec<String>> {
        let key = match options.key.as_deref() {
            Some(key) if !key.is_empty() => HashKey::from(key),
            _ => HashKey::generate(&self.entropy, DEFAULT_KEY_LEN)?,
        };

        (0..options.count)
            .map(|_| generate_session_id(&options.addr, options.hash_func, &key, &self.entropy))
            .collect()
    }
}
