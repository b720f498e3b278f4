//! CLI commands for Tether.
//!
//! Operational helpers around the library:
//! - **id**: generate session identifiers
//! - **config**: show the effective settings for a configuration file
//! - **gc**: sweep expired sessions from a file provider directory
//! - **providers**: list built-in providers

pub mod config_cmd;
pub mod gc;
pub mod id;
pub mod providers_cmd;

pub use config_cmd::ConfigCommand;
pub use gc::GcCommand;
pub use id::IdCommand;
pub use providers_cmd::ProvidersCommand;
