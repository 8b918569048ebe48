//! Storage backends for the statistics document
//!
//! The scheduler never sees how state is kept; it only needs whole-document
//! read and write.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use super::data::StoreData;
use super::StoreError;

/// Whole-document persistence
pub trait StatisticsStore: Send + Sync {
    /// Read the current document; a store that was never written yields the default
    fn read(&self) -> Result<StoreData, StoreError>;

    /// Replace the stored document
    fn write(&self, data: &StoreData) -> Result<(), StoreError>;
}

/// JSON document on disk, replaced atomically on every write
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<tmp>/smart-runner-db.json`
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("smart-runner-db.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatisticsStore for JsonFileStore {
    fn read(&self) -> Result<StoreData, StoreError> {
        if !self.path.exists() {
            debug!("No store at {}, starting empty", self.path.display());
            return Ok(StoreData::default());
        }

        let file = File::open(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, data: &StoreData) -> Result<(), StoreError> {
        let content = serde_json::to_vec_pretty(data)?;
        write_atomic(&self.path, &content)
    }
}

/// Write to a sibling temporary file, then rename over the target
fn write_atomic(path: &Path, content: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    let written = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)
        .and_then(|mut file| {
            file.write_all(content)?;
            file.sync_all()
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(StoreError::io(&temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::io(path, e)
    })
}

/// Volatile store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }
}

impl StatisticsStore for MemoryStore {
    fn read(&self) -> Result<StoreData, StoreError> {
        Ok(self.data.lock().clone())
    }

    fn write(&self, data: &StoreData) -> Result<(), StoreError> {
        *self.data.lock() = data.clone();
        Ok(())
    }
}
