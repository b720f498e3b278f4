//! File-based session provider.
//!
//! Each session is a JSON file named `<sid>.json` in the provider directory
//! (the `providerConfig` string, or `~/.tether/sessions/` when empty).
//! Handles buffer mutations in memory and `release` writes them back with a
//! temp file + rename, so concurrent requests on one session resolve as last
//! writer wins.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::sessions_dir;
use crate::error::{Result, TetherError};
use crate::storage::{Provider, SessionStore};

/// On-disk representation of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionRecord {
    id: String,
    values: HashMap<String, Value>,
    updated_at: DateTime<Utc>,
}

/// Outcome of one garbage-collection sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Session files removed.
    pub removed: usize,
    /// Session files left in place.
    pub remaining: usize,
}

/// Reject identifiers that could escape the session directory.
fn validate_sid(sid: &str) -> Result<()> {
    let valid = !sid.is_empty()
        && sid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TetherError::backend(format!(
            "invalid session id for file provider: {:?}",
            sid
        )))
    }
}

fn session_path(dir: &Path, sid: &str) -> PathBuf {
    dir.join(format!("{}.json", sid))
}

/// A temp path no other write in this process or any other shares.
fn temp_path(dir: &Path, sid: &str) -> PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let seq = NEXT.fetch_add(1, Ordering::Relaxed);
    dir.join(format!(".{}.{}.{}.json.tmp", sid, std::process::id(), seq))
}

/// Write a record atomically using temp file + rename.
fn atomic_write(dir: &Path, record: &SessionRecord) -> Result<()> {
    let final_path = session_path(dir, &record.id);
    let temp_path = temp_path(dir, &record.id);

    let json = serde_json::to_string_pretty(record)?;

    let written = fs::File::create_new(&temp_path).and_then(|mut file| {
        file.write_all(json.as_bytes())?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(TetherError::storage(&temp_path, e));
    }

    // Atomic on POSIX
    if let Err(e) = fs::rename(&temp_path, &final_path) {
        let _ = fs::remove_file(&temp_path);
        return Err(TetherError::storage(&final_path, e));
    }

    Ok(())
}

fn load_record(dir: &Path, sid: &str) -> Result<Option<SessionRecord>> {
    let path = session_path(dir, sid);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path).map_err(|e| TetherError::storage(&path, e))?;
    let record: SessionRecord = serde_json::from_str(&content)?;
    Ok(Some(record))
}

/// Session files in `dir`, skipping temp files and non-JSON entries.
fn session_files(dir: &Path) -> Result<Vec<(PathBuf, SystemTime)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| TetherError::storage(dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| TetherError::storage(dir, e))?;
        let path = entry.path();

        if path.extension().map(|e| e != "json").unwrap_or(true) {
            continue;
        }
        if path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('.'))
            .unwrap_or(true)
        {
            continue;
        }

        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((path, mtime));
    }

    Ok(files)
}

/// Remove session files in `dir` not modified within `lifetime_secs`.
pub fn sweep_dir(dir: &Path, lifetime_secs: i64) -> Result<SweepReport> {
    let lifetime = Duration::from_secs(lifetime_secs.max(0) as u64);
    let now = SystemTime::now();
    let mut report = SweepReport::default();

    for (path, mtime) in session_files(dir)? {
        let idle = now.duration_since(mtime).unwrap_or_default();
        if idle > lifetime {
            match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!("Failed to remove expired session {}: {}", path.display(), e);
                    report.remaining += 1;
                }
            }
        } else {
            report.remaining += 1;
        }
    }

    Ok(report)
}

/// Handle onto a session held by [`FileProvider`].
#[derive(Debug)]
pub struct FileSessionStore {
    id: String,
    dir: PathBuf,
    values: RwLock<HashMap<String, Value>>,
}

impl FileSessionStore {
    fn new(id: &str, dir: &Path, values: HashMap<String, Value>) -> Self {
        Self {
            id: id.to_string(),
            dir: dir.to_path_buf(),
            values: RwLock::new(values),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn session_id(&self) -> &str {
        &self.id
    }

    fn release(&self) -> Result<()> {
        let values = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let record = SessionRecord {
            id: self.id.clone(),
            values,
            updated_at: Utc::now(),
        };
        atomic_write(&self.dir, &record)
    }

    fn flush(&self) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// File-backed provider, registered as `"file"`.
#[derive(Debug, Default)]
pub struct FileProvider {
    dir: RwLock<Option<PathBuf>>,
    gc_lifetime: AtomicI64,
}

impl FileProvider {
    /// Create an uninitialized provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory in use, once initialized.
    pub fn dir(&self) -> Option<PathBuf> {
        self.dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require_dir(&self) -> Result<PathBuf> {
        self.dir()
            .ok_or_else(|| TetherError::backend("file provider used before init"))
    }

    /// Run one sweep and report what it did.
    pub fn sweep(&self) -> Result<SweepReport> {
        let dir = self.require_dir()?;
        sweep_dir(&dir, self.gc_lifetime.load(Ordering::Relaxed))
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn init(&self, gc_lifetime: i64, config: &str) -> Result<()> {
        let dir = if config.trim().is_empty() {
            sessions_dir().ok_or_else(|| {
                TetherError::backend("Could not determine sessions directory (no home directory)")
            })?
        } else {
            PathBuf::from(config.trim())
        };

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| TetherError::storage(&dir, e))?;
        }

        tracing::debug!("file provider storing sessions in {}", dir.display());
        self.gc_lifetime.store(gc_lifetime, Ordering::Relaxed);
        *self.dir.write().unwrap_or_else(PoisonError::into_inner) = Some(dir);
        Ok(())
    }

    fn read(&self, sid: &str) -> Result<Box<dyn SessionStore>> {
        validate_sid(sid)?;
        let dir = self.require_dir()?;

        let values = match load_record(&dir, sid)? {
            Some(record) => record.values,
            None => {
                let record = SessionRecord {
                    id: sid.to_string(),
                    values: HashMap::new(),
                    updated_at: Utc::now(),
                };
                atomic_write(&dir, &record)?;
                record.values
            }
        };

        Ok(Box::new(FileSessionStore::new(sid, &dir, values)))
    }

    fn exists(&self, sid: &str) -> bool {
        if validate_sid(sid).is_err() {
            return false;
        }
        self.dir()
            .map(|dir| session_path(&dir, sid).exists())
            .unwrap_or(false)
    }

    fn regenerate(&self, old_sid: &str, new_sid: &str) -> Result<Box<dyn SessionStore>> {
        validate_sid(old_sid)?;
        validate_sid(new_sid)?;
        let dir = self.require_dir()?;

        let values = load_record(&dir, old_sid)?
            .map(|record| record.values)
            .unwrap_or_default();

        let record = SessionRecord {
            id: new_sid.to_string(),
            values,
            updated_at: Utc::now(),
        };
        atomic_write(&dir, &record)?;
        self.destroy(old_sid)?;

        Ok(Box::new(FileSessionStore::new(new_sid, &dir, record.values)))
    }

    fn destroy(&self, sid: &str) -> Result<()> {
        validate_sid(sid)?;
        let dir = self.require_dir()?;

        let path = session_path(&dir, sid);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TetherError::storage(&path, e)),
        }
    }

    fn active_count(&self) -> usize {
        let Some(dir) = self.dir() else {
            return 0;
        };
        match session_files(&dir) {
            Ok(files) => files.len(),
            Err(e) => {
                tracing::warn!("Failed to count sessions in {}: {}", dir.display(), e);
                0
            }
        }
    }

    fn gc(&self) {
        match self.sweep() {
            Ok(report) => tracing::debug!(
                "file provider gc removed {} sessions, {} remaining",
                report.removed,
                report.remaining
            ),
            Err(e) => tracing::warn!("file provider gc failed: {}", e),
        }
    }
}
