//! Spec file discovery

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Spec root {0} does not exist or is not a directory")]
    RootMissing(PathBuf),

    #[error("Failed to walk spec tree: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to read spec {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every file under `root` whose name ends with `suffix`, in path order
pub fn find_spec_files(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::RootMissing(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix))
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
