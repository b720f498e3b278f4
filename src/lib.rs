//! Tether - pluggable session management
//!
//! Tether keeps per-client session state behind a [`Manager`] that talks to
//! a named storage [`Provider`]. Providers are registered once at startup in
//! a [`ProviderRegistry`]; the built-in `memory` and `file` providers cover
//! single-process deployments. Session identifiers are derived from the
//! client address, the current time and secure randomness, hashed with
//! HMAC-SHA1 (default) or MD5.

pub mod cli;
pub mod config;
pub mod error;
pub mod identifier;
pub mod manager;
pub mod registry;
pub mod storage;

pub use config::{LegacyOption, ManagerConfig, SessionSettings};
pub use error::{Result, TetherError};
pub use identifier::{EntropySource, HashFunc, HashKey, OsEntropy};
pub use manager::{Manager, SessionCookie};
pub use registry::ProviderRegistry;
pub use storage::{FileProvider, MemoryProvider, Provider, SessionStore, SessionStoreExt};

// CLI commands
pub use cli::{ConfigCommand, GcCommand, IdCommand, ProvidersCommand};
