//! Durable storage of the latest outcome record per cache key.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::OutcomeRecord;

/// Product folder under the base cache directory.
pub const CACHE_NAMESPACE: &str = "hostreport";

/// Identifies one report epoch, e.g. `ubuntu.24.04`.
///
/// Stable across runs on the same host until the OS release changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a distribution id and release version.
    pub fn new(distro: &str, version: &str) -> Self {
        Self(format!("{}.{}", sanitize(distro), sanitize(version)))
    }

    /// The key as a file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Key to record storage holding only the latest decision per key.
pub trait ReportStore {
    /// Previously stored record, or `None` if there is none or it can't be read as one.
    fn load(&self, key: &CacheKey) -> Result<Option<OutcomeRecord>>;

    /// Replace the record for `key`. Readers see the old or the new record, never a mix.
    fn save(&self, key: &CacheKey, record: &OutcomeRecord) -> Result<()>;
}

impl<S: ReportStore + ?Sized> ReportStore for &S {
    fn load(&self, key: &CacheKey) -> Result<Option<OutcomeRecord>> {
        (**self).load(key)
    }

    fn save(&self, key: &CacheKey, record: &OutcomeRecord) -> Result<()> {
        (**self).save(key, record)
    }
}

/// Store backed by one file per key under `<cache base>/hostreport/`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted in the given base cache directory.
    pub fn new(cache_base: impl AsRef<Path>) -> Self {
        Self {
            dir: cache_base.as_ref().join(CACHE_NAMESPACE),
        }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the record for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    fn write_error(&self, path: &Path, err: impl std::fmt::Display) -> Error {
        Error::StoreWrite {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl ReportStore for FileStore {
    fn load(&self, key: &CacheKey) -> Result<Option<OutcomeRecord>> {
        let path = self.path_for(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No previous record at {}", path.display());
                return Ok(None);
            }
            Err(e) => {
                // An unusable cache directory surfaces when the next save fails.
                info!("Ignoring unreadable record at {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        match OutcomeRecord::parse(&data) {
            Some(record) => {
                debug!("Found {} record at {}", record.kind(), path.display());
                Ok(Some(record))
            }
            None => {
                info!("Ignoring malformed record at {}", path.display());
                Ok(None)
            }
        }
    }

    fn save(&self, key: &CacheKey, record: &OutcomeRecord) -> Result<()> {
        let path = self.path_for(key);
        let content = record.to_json()?;

        fs::create_dir_all(&self.dir).map_err(|e| self.write_error(&self.dir, e))?;

        // Temp file in the same directory so the rename stays on one filesystem.
        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|e| self.write_error(&path, e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| self.write_error(&path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| self.write_error(&path, e))?;
        temp.persist(&path)
            .map_err(|e| self.write_error(&path, e.error))?;

        info!("Saved {} record to {}", record.kind(), path.display());
        Ok(())
    }
}

/// In-memory store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes stored for `key`.
    pub fn raw(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.records.lock().get(key).cloned()
    }

    /// Put arbitrary bytes under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &CacheKey, data: impl Into<Vec<u8>>) {
        self.records.lock().insert(key.clone(), data.into());
    }

    /// Number of keys with a record.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ReportStore for MemoryStore {
    fn load(&self, key: &CacheKey) -> Result<Option<OutcomeRecord>> {
        Ok(self
            .records
            .lock()
            .get(key)
            .and_then(|data| OutcomeRecord::parse(data)))
    }

    fn save(&self, key: &CacheKey, record: &OutcomeRecord) -> Result<()> {
        let content = record.to_json()?;
        self.records
            .lock()
            .insert(key.clone(), content.into_bytes());
        Ok(())
    }
}
