//! Session identifier generation.
//!
//! An identifier is derived from a signature made of the client address,
//! the current time in nanoseconds and 24 bytes from a secure random source.
//! The signature is hashed with HMAC-SHA1 under a server-held key (default)
//! or with plain MD5, and hex-encoded.
//!
//! Generation touches no shared mutable state, so it is safe to call from
//! many request threads at once as long as the entropy source is.

use std::fmt;

use chrono::Utc;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::error::{Result, TetherError};

type HmacSha1 = Hmac<Sha1>;

/// Number of random bytes mixed into every signature.
pub const RANDOM_BYTES: usize = 24;

/// Length of the hash key generated when none is configured.
pub const DEFAULT_KEY_LEN: usize = 16;

/// Hash algorithm used to derive identifiers from signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunc {
    /// Keyed HMAC-SHA1, 40 hex characters.
    #[default]
    Sha1,
    /// Plain MD5, 32 hex characters.
    Md5,
}

impl HashFunc {
    /// Get the selector string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }

    /// Parse a selector strictly.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha1" => Some(Self::Sha1),
            "md5" => Some(Self::Md5),
            _ => None,
        }
    }

    /// Resolve a configured selector.
    ///
    /// Empty selects the default. Unrecognized selectors fall back to
    /// HMAC-SHA1 so a typo never downgrades to an unkeyed hash.
    pub fn from_selector(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }
        Self::parse(s).unwrap_or_else(|| {
            tracing::warn!("Unrecognized session id hash function '{}', using sha1", s);
            Self::Sha1
        })
    }

    /// Length of the hex digest this function produces.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Md5 => 32,
        }
    }
}

impl fmt::Display for HashFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Secret key for the HMAC path.
///
/// Holds raw bytes since a generated key is not valid UTF-8. `Debug` prints
/// only the length.
#[derive(Clone, PartialEq, Eq)]
pub struct HashKey(Vec<u8>);

impl HashKey {
    /// Create a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Draw a fresh key of `len` bytes from `entropy`.
    pub fn generate(entropy: &dyn EntropySource, len: usize) -> Result<Self> {
        let mut bytes = vec![0u8; len];
        entropy.fill(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashKey(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for HashKey {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for HashKey {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

/// Source of cryptographically secure random bytes.
///
/// Implementations must be safe to call from many threads and must fail
/// rather than return fewer bytes than requested.
pub trait EntropySource: Send + Sync {
    /// Fill `buf` completely.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating system randomness via `getrandom`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::getrandom(buf).map_err(|e| {
            TetherError::identifier_generation(format!("secure random source failed: {}", e))
        })
    }
}

/// Build the raw signature: address, then nanoseconds in decimal, then the
/// random bytes verbatim.
pub fn build_signature(client_addr: &str, nanos: i64, random: &[u8]) -> Vec<u8> {
    let nanos = nanos.to_string();
    let mut sig = Vec::with_capacity(client_addr.len() + nanos.len() + random.len());
    sig.extend_from_slice(client_addr.as_bytes());
    sig.extend_from_slice(nanos.as_bytes());
    sig.extend_from_slice(random);
    sig
}

/// Hash a signature and hex-encode the digest.
pub fn digest_signature(signature: &[u8], func: HashFunc, key: &HashKey) -> Result<String> {
    match func {
        HashFunc::Md5 => Ok(hex::encode(Md5::digest(signature))),
        HashFunc::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(key.as_bytes()).map_err(|e| {
                TetherError::identifier_generation(format!("invalid hmac key: {}", e))
            })?;
            mac.update(signature);
            Ok(hex::encode(mac.finalize().into_bytes()))
        }
    }
}

/// Generate a session identifier for `client_addr` at the current time.
pub fn generate_session_id(
    client_addr: &str,
    func: HashFunc,
    key: &HashKey,
    entropy: &dyn EntropySource,
) -> Result<String> {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    generate_session_id_at(client_addr, nanos, func, key, entropy)
}

/// Generate a session identifier with an explicit timestamp.
///
/// Fails if the entropy source fails; never returns an empty identifier.
pub fn generate_session_id_at(
    client_addr: &str,
    nanos: i64,
    func: HashFunc,
    key: &HashKey,
    entropy: &dyn EntropySource,
) -> Result<String> {
    let mut random = [0u8; RANDOM_BYTES];
    entropy.fill(&mut random)?;
    let sig = build_signature(client_addr, nanos, &random);
    digest_signature(&sig, func, key)
}
