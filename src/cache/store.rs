//! Cache Store
//!
//! Persistent, TTL-evicting document cache on the local filesystem.
//!
//! # Write Discipline
//!
//! `put` writes to a temporary file, fsyncs it, checks its size, and only then
//! replaces the previous entry (remove, then rename). The final file is stat'ed
//! once more before success is reported. Readers never observe a partial file.
//!
//! # Concurrency
//!
//! Writes to the same key are serialized through a per-key async mutex, so a
//! second `put` waits for the first and then supersedes it. Distinct keys and
//! all reads proceed without coordination.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::key::CacheKey;

/// Default retention window for cache entries
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Prefix of in-flight temporary files; never a valid key
const TEMP_PREFIX: &str = ".tmp-";

// ============================================================================
// Types
// ============================================================================

/// Cache store errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache entry not found: {0}")]
    NotFound(String),

    #[error("Cache write for {0} produced an empty file")]
    EmptyAfterWrite(String),

    #[error("Failed to write cache entry {key}: {detail}")]
    WriteFailed { key: String, detail: String },

    #[error("Failed to verify cache entry {key}: {detail}")]
    VerifyFailed { key: String, detail: String },

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    fn write_failed(key: &CacheKey, detail: impl std::fmt::Display) -> Self {
        Self::WriteFailed {
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }

    fn verify_failed(key: &CacheKey, detail: impl std::fmt::Display) -> Self {
        Self::VerifyFailed {
            key: key.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// A confirmed, live cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Cache Store
// ============================================================================

/// Filesystem-backed document cache
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheStoreInner>,
}

struct CacheStoreInner {
    /// Directory holding one file per entry
    root: PathBuf,

    /// Entries older than this are evicted before each write
    retention: Duration,

    /// In-flight write guards, one per key
    write_locks: WriteLocks,
}

type WriteLocks = Mutex<HashMap<CacheKey, KeyLock>>;

struct KeyLock {
    mutex: Arc<tokio::sync::Mutex<()>>,
    /// Leases holding or waiting on `mutex`
    users: usize,
}

impl CacheStore {
    /// Create a store rooted at `root`; the directory is created on first write
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            inner: Arc::new(CacheStoreInner {
                root: root.into(),
                retention,
                write_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create a store with the default 7-day retention
    pub fn with_default_retention(root: impl Into<PathBuf>) -> Self {
        Self::new(root, Duration::days(DEFAULT_RETENTION_DAYS))
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn retention(&self) -> Duration {
        self.inner.retention
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.inner.root.join(key.as_str())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Store `bytes` under `key`, replacing any previous entry
    ///
    /// Dropping the returned future early releases the key's write lock and
    /// removes any staged temp file.
    pub async fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<CacheEntry, StoreError> {
        let lease = WriteLease::acquire(&self.inner.write_locks, key);
        let result = {
            let _guard = lease.lock().await;
            self.evict_expired(self.inner.retention).await;
            self.write_verified(key, bytes).await
        };
        drop(lease);

        match &result {
            Ok(entry) => tracing::info!(
                key = %key,
                size = entry.size_bytes,
                "Stored cache entry"
            ),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache write failed"),
        }

        result
    }

    async fn write_verified(&self, key: &CacheKey, bytes: &[u8]) -> Result<CacheEntry, StoreError> {
        tokio::fs::create_dir_all(&self.inner.root)
            .await
            .map_err(|e| StoreError::write_failed(key, e))?;

        let path = self.entry_path(key);
        let temp_path = self
            .inner
            .root
            .join(format!("{}{}.{}", TEMP_PREFIX, key, Uuid::new_v4()));

        // Staging runs to completion on the blocking pool even if this future
        // is dropped; the temp guard then goes down with the task output.
        let staged = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            move || stage(temp_path, &bytes)
        })
        .await
        .map_err(|e| StoreError::write_failed(key, e))?;

        // Verify the staged copy before it replaces anything
        let (temp, staged_len) = match staged {
            Ok(staged) => staged,
            Err(e) => return Err(StoreError::write_failed(key, e)),
        };
        if staged_len == 0 {
            return Err(StoreError::EmptyAfterWrite(key.to_string()));
        }
        if staged_len != bytes.len() as u64 {
            return Err(StoreError::verify_failed(
                key,
                format!("wrote {} of {} bytes", staged_len, bytes.len()),
            ));
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(key = %key, "Replacing existing cache entry"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::write_failed(key, e)),
        }

        tokio::fs::rename(temp.path(), &path)
            .await
            .map_err(|e| StoreError::write_failed(key, e))?;
        temp.persist();

        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StoreError::verify_failed(key, e))?;
        if meta.len() != staged_len {
            return Err(StoreError::verify_failed(
                key,
                format!("expected {} bytes, found {}", staged_len, meta.len()),
            ));
        }

        Ok(CacheEntry {
            key: key.clone(),
            path,
            size_bytes: meta.len(),
            created_at: entry_created_at(key, &meta),
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Look up a live entry
    pub async fn get(&self, key: &CacheKey) -> Result<CacheEntry, StoreError> {
        let path = self.entry_path(key);
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => return Err(StoreError::NotFound(key.to_string())),
        };

        Ok(CacheEntry {
            key: key.clone(),
            path,
            size_bytes: meta.len(),
            created_at: entry_created_at(key, &meta),
        })
    }

    /// All live entries, newest first
    pub async fn list(&self) -> Vec<CacheEntry> {
        let mut entries = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.inner.root).await {
            Ok(dir) => dir,
            Err(_) => return entries,
        };

        while let Ok(Some(item)) = dir.next_entry().await {
            let name = item.file_name().to_string_lossy().to_string();
            let Ok(key) = CacheKey::parse(&name) else {
                continue;
            };
            let Ok(meta) = item.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            entries.push(CacheEntry {
                created_at: entry_created_at(&key, &meta),
                key,
                path: item.path(),
                size_bytes: meta.len(),
            });
        }

        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    /// Remove entries created before `now - retention`
    ///
    /// Best-effort: failures on individual files are logged and skipped.
    /// Returns the number of files removed.
    pub async fn evict_expired(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;

        let mut dir = match tokio::fs::read_dir(&self.inner.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                tracing::warn!(
                    root = %self.inner.root.display(),
                    error = %e,
                    "Failed to scan cache directory"
                );
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let item = match dir.next_entry().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Cache scan interrupted");
                    break;
                }
            };

            let name = item.file_name().to_string_lossy().to_string();
            let meta = match item.metadata().await {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };

            // Leftover temp files only age out by mtime
            let created_at = if name.starts_with(TEMP_PREFIX) {
                modified_at(&meta)
            } else {
                match CacheKey::parse(&name) {
                    Ok(key) => Some(entry_created_at(&key, &meta)),
                    Err(_) => continue,
                }
            };

            let Some(created_at) = created_at else {
                continue;
            };
            if created_at >= cutoff {
                continue;
            }

            match tokio::fs::remove_file(item.path()).await {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(file = %name, created_at = %created_at, "Evicted cache entry");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %name, error = %e, "Failed to evict cache entry");
                }
            }
        }

        if removed > 0 {
            tracing::info!(count = removed, "Evicted expired cache entries");
        }

        removed
    }
}

// ============================================================================
// Guards
// ============================================================================

/// A registered interest in one key's write lock
///
/// The map entry goes away with the last lease, however the owning
/// future ends.
struct WriteLease<'a> {
    locks: &'a WriteLocks,
    key: CacheKey,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> WriteLease<'a> {
    fn acquire(locks: &'a WriteLocks, key: &CacheKey) -> Self {
        let mut map = locks.lock();
        let slot = map.entry(key.clone()).or_insert_with(|| KeyLock {
            mutex: Arc::new(tokio::sync::Mutex::new(())),
            users: 0,
        });
        slot.users += 1;
        Self {
            locks,
            key: key.clone(),
            mutex: slot.mutex.clone(),
        }
    }

    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.lock();
        if let Some(slot) = map.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                map.remove(&self.key);
            }
        }
    }
}

/// A staged file that is removed on drop unless persisted
struct TempFile {
    path: Option<PathBuf>,
}

impl TempFile {
    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// The file has been renamed into place; leave it alone
    fn persist(mut self) {
        self.path = None;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(file = %path.display(), "Removed staged cache file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    file = %path.display(),
                    error = %e,
                    "Failed to remove staged cache file"
                ),
            }
        }
    }
}

/// Write and fsync `bytes` to `path`, returning the guard and the on-disk size
fn stage(path: PathBuf, bytes: &[u8]) -> std::io::Result<(TempFile, u64)> {
    let temp = TempFile { path: Some(path) };
    let mut file = std::fs::File::create(temp.path())?;
    file.write_all(bytes)?;
    file.sync_all()?;
    let len = file.metadata()?.len();
    Ok((temp, len))
}

fn modified_at(meta: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    meta.modified().ok().map(DateTime::<Utc>::from)
}

fn entry_created_at(key: &CacheKey, meta: &std::fs::Metadata) -> DateTime<Utc> {
    key.created_at()
        .or_else(|| modified_at(meta))
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// Tests
// ============================================================================
