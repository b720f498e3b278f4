//! In-memory session provider.
//!
//! Sessions live in a shared map and are lost when the provider is dropped.
//! Every handle for a session points at the same entry, so writes are
//! visible to concurrent requests immediately; each entry is guarded by its
//! own `RwLock`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::error::Result;
use crate::storage::{Provider, SessionStore};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct MemoryEntry {
    id: String,
    values: RwLock<HashMap<String, Value>>,
    last_access: RwLock<DateTime<Utc>>,
}

impl MemoryEntry {
    fn new(id: &str, values: HashMap<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            values: RwLock::new(values),
            last_access: RwLock::new(Utc::now()),
        }
    }

    fn touch(&self) {
        *write(&self.last_access) = Utc::now();
    }
}

/// Handle onto a session held by [`MemoryProvider`].
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    entry: Arc<MemoryEntry>,
}

impl SessionStore for MemorySessionStore {
    fn set(&self, key: &str, value: Value) -> Result<()> {
        write(&self.entry.values).insert(key.to_string(), value);
        self.entry.touch();
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        read(&self.entry.values).get(key).cloned()
    }

    fn delete(&self, key: &str) -> Result<()> {
        write(&self.entry.values).remove(key);
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.entry.id
    }

    fn release(&self) -> Result<()> {
        self.entry.touch();
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        write(&self.entry.values).clear();
        Ok(())
    }
}

/// Reference in-memory provider, registered as `"memory"`.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    sessions: RwLock<HashMap<String, Arc<MemoryEntry>>>,
    gc_lifetime: AtomicI64,
}

impl MemoryProvider {
    /// Create a new empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions held.
    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    /// Check if no sessions are held.
    pub fn is_empty(&self) -> bool {
        read(&self.sessions).is_empty()
    }

    /// Drop every session.
    pub fn clear(&self) {
        write(&self.sessions).clear();
    }

    fn store(entry: Arc<MemoryEntry>) -> Box<dyn SessionStore> {
        Box::new(MemorySessionStore { entry })
    }
}

impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn init(&self, gc_lifetime: i64, _config: &str) -> Result<()> {
        self.gc_lifetime.store(gc_lifetime, Ordering::Relaxed);
        Ok(())
    }

    fn read(&self, sid: &str) -> Result<Box<dyn SessionStore>> {
        if let Some(entry) = read(&self.sessions).get(sid) {
            entry.touch();
            return Ok(Self::store(Arc::clone(entry)));
        }

        let mut sessions = write(&self.sessions);
        // Another request may have created it between the two locks.
        let entry = sessions
            .entry(sid.to_string())
            .or_insert_with(|| Arc::new(MemoryEntry::new(sid, HashMap::new())));
        Ok(Self::store(Arc::clone(entry)))
    }

    fn exists(&self, sid: &str) -> bool {
        read(&self.sessions).contains_key(sid)
    }

    fn regenerate(&self, old_sid: &str, new_sid: &str) -> Result<Box<dyn SessionStore>> {
        let mut sessions = write(&self.sessions);
        let values = sessions
            .remove(old_sid)
            .map(|old| read(&old.values).clone())
            .unwrap_or_default();
        let entry = Arc::new(MemoryEntry::new(new_sid, values));
        sessions.insert(new_sid.to_string(), Arc::clone(&entry));
        Ok(Self::store(entry))
    }

    fn destroy(&self, sid: &str) -> Result<()> {
        write(&self.sessions).remove(sid);
        Ok(())
    }

    fn active_count(&self) -> usize {
        self.len()
    }

    fn gc(&self) {
        let lifetime = self.gc_lifetime.load(Ordering::Relaxed);
        // A lifetime reaching past the representable range expires nothing.
        let Some(cutoff) =
            Duration::try_seconds(lifetime).and_then(|d| Utc::now().checked_sub_signed(d))
        else {
            tracing::debug!("memory provider gc skipped: lifetime {}s never expires", lifetime);
            return;
        };
        let mut sessions = write(&self.sessions);
        let before = sessions.len();
        sessions.retain(|_, entry| *read(&entry.last_access) >= cutoff);
        tracing::debug!(
            "memory provider gc removed {} of {} sessions",
            before - sessions.len(),
            before
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::tests::test_session_store_contract;
    use serde_json::json;

    fn provider() -> MemoryProvider {
        let provider = MemoryProvider::new();
        provider.init(3600, "").unwrap();
        provider
    }

    fn age(provider: &MemoryProvider, sid: &str, seconds: i64) {
        let sessions = read(&provider.sessions);
        let entry = sessions.get(sid).unwrap();
        *write(&entry.last_access) = Utc::now() - Duration::seconds(seconds);
    }

    #[test]
    fn test_memory_provider_contract() {
        test_session_store_contract(&provider());
    }

    #[test]
    fn test_new_provider_is_empty() {
        let provider = MemoryProvider::new();
        assert!(provider.is_empty());
        assert_eq!(provider.active_count(), 0);
    }

    #[test]
    fn test_read_creates_session() {
        let provider = provider();
        provider.read("s1").unwrap();
        provider.read("s2").unwrap();
        provider.read("s1").unwrap();
        assert_eq!(provider.active_count(), 2);
    }

    #[test]
    fn test_handles_share_state() {
        let provider = provider();
        let a = provider.read("shared").unwrap();
        let b = provider.read("shared").unwrap();

        a.set("theme", json!("dark")).unwrap();
        assert_eq!(b.get("theme"), Some(json!("dark")));

        b.flush().unwrap();
        assert!(a.get("theme").is_none());
    }

    #[test]
    fn test_regenerate_unknown_session_creates_empty() {
        let provider = provider();
        let store = provider.regenerate("missing", "fresh").unwrap();
        assert_eq!(store.session_id(), "fresh");
        assert!(store.get("anything").is_none());
        assert!(provider.exists("fresh"));
    }

    #[test]
    fn test_gc_removes_idle_sessions() {
        let provider = provider();
        provider.read("old").unwrap();
        provider.read("recent").unwrap();
        age(&provider, "old", 7200);
        age(&provider, "recent", 60);

        provider.gc();

        assert!(!provider.exists("old"));
        assert!(provider.exists("recent"));
        assert_eq!(provider.active_count(), 1);
    }

    #[test]
    fn test_gc_with_huge_lifetime_keeps_sessions() {
        for lifetime in [1_000_000_000_000_000, i64::MAX / 1000 + 1, i64::MAX] {
            let provider = MemoryProvider::new();
            provider.init(lifetime, "").unwrap();
            provider.read("a").unwrap();
            age(&provider, "a", 7200);

            provider.gc();

            assert!(provider.exists("a"), "lifetime {} evicted a session", lifetime);
        }
    }

    #[test]
    fn test_release_refreshes_last_access() {
        let provider = provider();
        let store = provider.read("kept").unwrap();
        age(&provider, "kept", 7200);

        store.release().unwrap();
        provider.gc();

        assert!(provider.exists("kept"));
    }

    #[test]
    fn test_clear() {
        let provider = provider();
        provider.read("a").unwrap();
        provider.read("b").unwrap();
        provider.clear();
        assert!(provider.is_empty());
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let provider = Arc::new(provider());
        let mut handles = vec![];

        for i in 0..10 {
            let provider = Arc::clone(&provider);
            handles.push(thread::spawn(move || {
                let store = provider.read("contended").unwrap();
                store.set(&format!("k{}", i), json!(i)).unwrap();
                store.release().unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let store = provider.read("contended").unwrap();
        for i in 0..10 {
            assert_eq!(store.get(&format!("k{}", i)), Some(json!(i)));
        }
        assert_eq!(provider.active_count(), 1);
    }
}
