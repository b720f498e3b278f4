//! Unified error types for Tether.
//!
//! Most errors are recoverable and surface to the caller unchanged. A small
//! set describes startup misconfiguration (duplicate or missing providers, a
//! backend that failed to initialize); those are classified as fatal and the
//! process hosting the manager must not keep serving after seeing one.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Tether operations.
#[derive(Error, Debug)]
pub enum TetherError {
    /// The requested provider name is not registered.
    #[error("session: unknown provider {name:?} (forgotten registration?)")]
    UnknownProvider { name: String },

    /// The configuration payload is malformed or a field is missing or mistyped.
    #[error("invalid configuration: {detail}")]
    InvalidConfiguration { detail: String },

    /// The provider failed to initialize. Fatal.
    #[error("provider {provider:?} failed to initialize: {message}")]
    BackendInitialization { provider: String, message: String },

    /// The secure random source could not supply bytes.
    #[error("session id generation failed: {message}")]
    IdentifierGeneration { message: String },

    /// A provider name was registered twice. Fatal.
    #[error("session: register called twice for provider {name:?}")]
    DuplicateProvider { name: String },

    /// A registration supplied no provider. Fatal.
    #[error("session: register provider {name:?} is nil")]
    NilProvider { name: String },

    /// Backend persistence errors (set, delete, flush, release).
    #[error("backend error: {message}")]
    Backend { message: String },

    /// I/O errors from file-backed session storage.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML (de)serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Session not found in the provider.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },
}

/// A specialized Result type for Tether operations.
pub type Result<T> = std::result::Result<T, TetherError>;

impl TetherError {
    /// Create an unknown provider error.
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider { name: name.into() }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(detail: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            detail: detail.into(),
        }
    }

    /// Create a backend initialization error.
    pub fn backend_initialization(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendInitialization {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create an identifier generation error.
    pub fn identifier_generation(message: impl Into<String>) -> Self {
        Self::IdentifierGeneration {
            message: message.into(),
        }
    }

    /// Create a duplicate provider error.
    pub fn duplicate_provider(name: impl Into<String>) -> Self {
        Self::DuplicateProvider { name: name.into() }
    }

    /// Create a nil provider error.
    pub fn nil_provider(name: impl Into<String>) -> Self {
        Self::NilProvider { name: name.into() }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a session not found error.
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Check if this error must stop the process.
    ///
    /// Duplicate or nil registrations and failed backend initialization are
    /// startup bugs. Everything else is recoverable by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BackendInitialization { .. }
                | Self::DuplicateProvider { .. }
                | Self::NilProvider { .. }
        )
    }
}

impl From<io::Error> for TetherError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the Tether CLI.
pub mod exit_codes {
    /// Command completed.
    pub const OK: u8 = 0;

    /// Recoverable error (bad input, unknown provider, I/O).
    pub const ERROR: u8 = 1;

    /// Fatal startup error (see [`TetherError::is_fatal`](super::TetherError::is_fatal)).
    pub const FATAL: u8 = 3;
}
