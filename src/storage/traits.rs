//! Session storage traits for Tether.
//!
//! A [`Provider`] is a named storage backend; a [`SessionStore`] is the
//! per-session handle a provider hands out. Values are stored as
//! `serde_json::Value` so any serializable type can round-trip through any
//! backend.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TetherError};

/// Per-session read/write handle.
///
/// Concurrency across handles of the same session is the backend's
/// business: the memory backend shares state between handles, the file
/// backend buffers per handle and the last release wins.
pub trait SessionStore: Send + Sync {
    /// Insert or replace a value.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Read a value. Absence is not an error.
    fn get(&self, key: &str) -> Option<Value>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// The identifier assigned at creation.
    fn session_id(&self) -> &str;

    /// Persist pending mutations and finish the request.
    ///
    /// Called once per request that touched the session. Cookie emission is
    /// the caller's concern, not the store's.
    fn release(&self) -> Result<()>;

    /// Remove every key while keeping the session identity.
    fn flush(&self) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn set(&self, key: &str, value: Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn session_id(&self) -> &str {
        (**self).session_id()
    }

    fn release(&self) -> Result<()> {
        (**self).release()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

/// Typed helpers over [`SessionStore`].
pub trait SessionStoreExt: SessionStore {
    /// Serialize `value` and store it under `key`.
    fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value)
    }

    /// Read `key` and deserialize it.
    ///
    /// Returns `Ok(None)` when the key is absent and an error when the stored
    /// value does not match `T`.
    fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| TetherError::serde(format!("session key '{}': {}", key, e))),
            None => Ok(None),
        }
    }
}

impl<S: SessionStore + ?Sized> SessionStoreExt for S {}

/// A named, pluggable session storage backend.
///
/// Providers are registered once at startup and shared for the life of the
/// process, so every method takes `&self` and implementations synchronize
/// internally.
pub trait Provider: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &'static str;

    /// Cookie name used when the configuration does not set one.
    fn default_cookie_name(&self) -> &str {
        "tethersessionid"
    }

    /// Prepare the backend. Called once by the manager before serving.
    fn init(&self, gc_lifetime: i64, config: &str) -> Result<()>;

    /// Open the session `sid`, creating it if it does not exist.
    fn read(&self, sid: &str) -> Result<Box<dyn SessionStore>>;

    /// Check whether `sid` exists.
    fn exists(&self, sid: &str) -> bool;

    /// Move the data of `old_sid` under `new_sid` and open it.
    ///
    /// If `old_sid` does not exist an empty session is created for `new_sid`.
    fn regenerate(&self, old_sid: &str, new_sid: &str) -> Result<Box<dyn SessionStore>>;

    /// Destroy `sid`. Destroying an unknown session is not an error.
    fn destroy(&self, sid: &str) -> Result<()>;

    /// Number of live sessions.
    fn active_count(&self) -> usize;

    /// Remove sessions idle longer than the configured lifetime.
    fn gc(&self);
}

impl<T: Provider + ?Sized> Provider for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn default_cookie_name(&self) -> &str {
        (**self).default_cookie_name()
    }

    fn init(&self, gc_lifetime: i64, config: &str) -> Result<()> {
        (**self).init(gc_lifetime, config)
    }

    fn read(&self, sid: &str) -> Result<Box<dyn SessionStore>> {
        (**self).read(sid)
    }

    fn exists(&self, sid: &str) -> bool {
        (**self).exists(sid)
    }

    fn regenerate(&self, old_sid: &str, new_sid: &str) -> Result<Box<dyn SessionStore>> {
        (**self).regenerate(old_sid, new_sid)
    }

    fn destroy(&self, sid: &str) -> Result<()> {
        (**self).destroy(sid)
    }

    fn active_count(&self) -> usize {
        (**self).active_count()
    }

    fn gc(&self) {
        (**self).gc()
    }
}
