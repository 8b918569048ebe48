//! Statistics store
//!
//! Persistent cache of last results, per-spec performance baselines, full run
//! history and performance trends.

#![allow(dead_code)]

mod backend;
mod data;
mod db;
pub mod stats;

use std::path::{Path, PathBuf};
use thiserror::Error;

pub use backend::{JsonFileStore, StatisticsStore};
pub use data::{
    CacheEntry, HistoryStats, PerformanceBaseline, StoreData, SuiteSummary, TrendPoint,
};
pub use db::StatsDb;

/// Errors reading or writing persisted state
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {path} is not a valid statistics document: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize statistics: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
