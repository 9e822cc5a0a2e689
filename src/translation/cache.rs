use crate::utils::{CacheConfig, Result, TranslatorError};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TRANSLATIONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("translations");

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    translated_text: String,
    last_access_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub size_bytes: u64,
    pub last_access_time: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub size_bytes: u64,
    pub evictions: u64,
}

enum CacheStore {
    Memory(HashMap<String, StoredEntry>),
    Disk(Arc<Database>),
}

impl CacheStore {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path).map_err(|e| TranslatorError::CacheError(e.to_string()))?;
        let write_txn = db
            .begin_write()
            .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
        {
            let _ = write_txn
                .open_table(TRANSLATIONS_TABLE)
                .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| TranslatorError::CacheError(e.to_string()))?;

        Ok(CacheStore::Disk(Arc::new(db)))
    }

    fn read(&self, key: &str) -> Result<Option<StoredEntry>> {
        match self {
            CacheStore::Memory(map) => Ok(map.get(key).cloned()),
            CacheStore::Disk(db) => {
                let read_txn = db
                    .begin_read()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                let table = read_txn
                    .open_table(TRANSLATIONS_TABLE)
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;

                match table.get(key) {
                    Ok(Some(data)) => Ok(Some(serde_json::from_slice(data.value())?)),
                    Ok(None) => Ok(None),
                    Err(e) => Err(TranslatorError::CacheError(e.to_string())),
                }
            }
        }
    }

    fn write(&mut self, key: &str, entry: &StoredEntry) -> Result<()> {
        match self {
            CacheStore::Memory(map) => {
                map.insert(key.to_string(), entry.clone());
                Ok(())
            }
            CacheStore::Disk(db) => {
                let data = serde_json::to_vec(entry)?;
                let write_txn = db
                    .begin_write()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                {
                    let mut table = write_txn
                        .open_table(TRANSLATIONS_TABLE)
                        .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    table
                        .insert(key, data.as_slice())
                        .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                }
                write_txn
                    .commit()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))
            }
        }
    }

    /// Rewrites stored access times in one transaction. Missing keys are skipped.
    fn touch(&mut self, stamps: &[(String, u64)]) -> Result<()> {
        match self {
            CacheStore::Memory(map) => {
                for (key, stamp) in stamps {
                    if let Some(entry) = map.get_mut(key) {
                        entry.last_access_time = *stamp;
                    }
                }
                Ok(())
            }
            CacheStore::Disk(db) => {
                let write_txn = db
                    .begin_write()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                {
                    let mut table = write_txn
                        .open_table(TRANSLATIONS_TABLE)
                        .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    for (key, stamp) in stamps {
                        let existing = table
                            .get(key.as_str())
                            .map_err(|e| TranslatorError::CacheError(e.to_string()))?
                            .map(|data| data.value().to_vec());
                        let Some(existing) = existing else { continue };

                        let mut stored: StoredEntry = serde_json::from_slice(&existing)?;
                        stored.last_access_time = *stamp;
                        let data = serde_json::to_vec(&stored)?;
                        table
                            .insert(key.as_str(), data.as_slice())
                            .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    }
                }
                write_txn
                    .commit()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))
            }
        }
    }

    fn remove(&mut self, keys: &[String]) -> Result<()> {
        match self {
            CacheStore::Memory(map) => {
                for key in keys {
                    map.remove(key);
                }
                Ok(())
            }
            CacheStore::Disk(db) => {
                let write_txn = db
                    .begin_write()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                {
                    let mut table = write_txn
                        .open_table(TRANSLATIONS_TABLE)
                        .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    for key in keys {
                        table
                            .remove(key.as_str())
                            .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    }
                }
                write_txn
                    .commit()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))
            }
        }
    }

    fn scan(&self) -> Result<Vec<CacheEntry>> {
        match self {
            CacheStore::Memory(map) => Ok(map
                .iter()
                .map(|(key, entry)| CacheEntry {
                    key: key.clone(),
                    size_bytes: entry.translated_text.len() as u64,
                    last_access_time: entry.last_access_time,
                })
                .collect()),
            CacheStore::Disk(db) => {
                let read_txn = db
                    .begin_read()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                let table = read_txn
                    .open_table(TRANSLATIONS_TABLE)
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;

                let mut entries = Vec::new();
                let iter = table
                    .iter()
                    .map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                for result in iter {
                    let (key, value) =
                        result.map_err(|e| TranslatorError::CacheError(e.to_string()))?;
                    let stored: StoredEntry = serde_json::from_slice(value.value())?;
                    entries.push(CacheEntry {
                        key: key.value().to_string(),
                        size_bytes: stored.translated_text.len() as u64,
                        last_access_time: stored.last_access_time,
                    });
                }
                Ok(entries)
            }
        }
    }
}

struct CacheInner {
    store: CacheStore,
    index: HashMap<String, CacheEntry>,
    /// Keys whose access time in `index` is newer than the stored one.
    touched: HashSet<String>,
    total_size: u64,
    clock: u64,
}

impl CacheInner {
    /// Millisecond timestamp, forced strictly increasing so access order is total.
    fn next_stamp(&mut self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.clock = now.max(self.clock + 1);
        self.clock
    }

    fn persist_access_times(&mut self) {
        if self.touched.is_empty() {
            return;
        }
        let stamps: Vec<(String, u64)> = self
            .touched
            .iter()
            .filter_map(|key| self.index.get(key).map(|e| (key.clone(), e.last_access_time)))
            .collect();

        match self.store.touch(&stamps) {
            Ok(()) => {
                debug!(entries = stamps.len(), "Persisted cache access times");
                self.touched.clear();
            }
            Err(e) => warn!(error = %e, "Could not persist cache access times"),
        }
    }
}

/// Content-addressed translation cache with size-bounded eviction.
///
/// Failures in the underlying store are logged and degrade to a miss.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<Mutex<CacheInner>>,
    max_size_bytes: u64,
    eviction_fraction: f32,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl TranslationCache {
    pub fn in_memory(max_size_bytes: u64) -> Self {
        Self::with_store(CacheStore::Memory(HashMap::new()), Vec::new(), max_size_bytes, 0.2)
    }

    pub fn open(path: &Path, max_size_bytes: u64) -> Result<Self> {
        let store = CacheStore::open(path)?;
        let entries = store.scan()?;
        info!(path = %path.display(), entries = entries.len(), "Translation cache opened");
        Ok(Self::with_store(store, entries, max_size_bytes, 0.2))
    }

    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let cache = match &config.db_path {
            Some(path) => Self::open(path, config.max_size_bytes())?,
            None => Self::in_memory(config.max_size_bytes()),
        };
        Ok(cache.with_eviction_fraction(config.eviction_fraction))
    }

    fn with_store(
        store: CacheStore,
        entries: Vec<CacheEntry>,
        max_size_bytes: u64,
        eviction_fraction: f32,
    ) -> Self {
        let total_size = entries.iter().map(|e| e.size_bytes).sum();
        let clock = entries.iter().map(|e| e.last_access_time).max().unwrap_or(0);
        let index = entries.into_iter().map(|e| (e.key.clone(), e)).collect();

        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                store,
                index,
                touched: HashSet::new(),
                total_size,
                clock,
            })),
            max_size_bytes,
            eviction_fraction,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_eviction_fraction(mut self, fraction: f32) -> Self {
        self.eviction_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn key(text: &str, lang: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}-{}", lang, text.trim()).as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn get(&self, text: &str, lang: &str) -> Option<String> {
        let key = Self::key(text, lang);
        let mut inner = self.inner.lock().await;

        if !inner.index.contains_key(&key) {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let stored = match inner.store.read(&key) {
            Ok(Some(stored)) => stored,
            Ok(None) => {
                if let Some(entry) = inner.index.remove(&key) {
                    inner.total_size = inner.total_size.saturating_sub(entry.size_bytes);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                warn!(key = %&key[..8], error = %e, "Cache read failed, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        let stamp = inner.next_stamp();
        if let Some(entry) = inner.index.get_mut(&key) {
            entry.last_access_time = stamp;
        }
        inner.touched.insert(key.clone());

        self.hits.fetch_add(1, Ordering::Relaxed);
        debug!(key = %&key[..8], "Cache hit");
        Some(stored.translated_text)
    }

    pub async fn put(&self, text: &str, lang: &str, translated_text: &str) {
        let key = Self::key(text, lang);
        let mut inner = self.inner.lock().await;

        let stamp = inner.next_stamp();
        let stored = StoredEntry {
            translated_text: translated_text.to_string(),
            last_access_time: stamp,
        };
        if let Err(e) = inner.store.write(&key, &stored) {
            warn!(key = %&key[..8], error = %e, "Cache write failed");
            return;
        }

        inner.touched.remove(&key);
        let size_bytes = translated_text.len() as u64;
        let previous = inner.index.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                size_bytes,
                last_access_time: stamp,
            },
        );
        if let Some(previous) = previous {
            inner.total_size = inner.total_size.saturating_sub(previous.size_bytes);
        }
        inner.total_size += size_bytes;
        debug!(key = %&key[..8], size_bytes, "Cache entry stored");

        if inner.total_size > self.max_size_bytes {
            self.evict(&mut inner);
        }
    }

    /// Removes the least recently accessed fraction of entries by count.
    fn evict(&self, inner: &mut CacheInner) {
        let mut entries: Vec<CacheEntry> = inner.index.values().cloned().collect();
        entries.sort_by_key(|e| e.last_access_time);

        // Integer per-mille keeps ceil() exact for fractions like 0.2.
        let permille = (self.eviction_fraction * 1000.0).round() as usize;
        let count = ((entries.len() * permille).div_ceil(1000))
            .max(1)
            .min(entries.len());
        let victims: Vec<String> = entries[..count].iter().map(|e| e.key.clone()).collect();

        if let Err(e) = inner.store.remove(&victims) {
            warn!(error = %e, "Cache eviction failed");
            return;
        }

        let before = inner.total_size;
        for key in &victims {
            inner.touched.remove(key);
            if let Some(entry) = inner.index.remove(key) {
                inner.total_size = inner.total_size.saturating_sub(entry.size_bytes);
            }
        }
        self.evictions.fetch_add(victims.len() as u64, Ordering::Relaxed);
        inner.persist_access_times();

        info!(
            evicted = victims.len(),
            bytes_freed = before - inner.total_size,
            size_bytes = inner.total_size,
            "Cache over capacity, evicted oldest entries"
        );
    }

    /// Writes access times recorded by hits back to the store.
    pub async fn flush(&self) {
        self.inner.lock().await.persist_access_times();
    }

    pub async fn contains(&self, text: &str, lang: &str) -> bool {
        let key = Self::key(text, lang);
        self.inner.lock().await.index.contains_key(&key)
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: inner.index.len(),
            size_bytes: inner.total_size,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
