//! Session storage for Tether.
//!
//! This module defines the provider and per-session store contracts and
//! ships two backends: an in-memory reference provider and a JSON file
//! provider.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::{FileProvider, FileSessionStore, SweepReport};
pub use memory::{MemoryProvider, MemorySessionStore};
pub use traits::{Provider, SessionStore, SessionStoreExt};
