//! Discovered spec descriptors

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// One spec found during a discovery pass
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpecDescriptor {
    pub path: PathBuf,
    pub priority: f64,
    pub dependency_hash: String,
}

impl SpecDescriptor {
    pub fn new(
        path: impl Into<PathBuf>,
        priority: f64,
        dependency_hash: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            priority,
            dependency_hash: dependency_hash.into(),
        }
    }

    /// Store key for this spec
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Containing directory, used as the secondary sort key
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

impl fmt::Display for SpecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {:.3})", self.path.display(), self.priority)
    }
}

