//! Listing of the top-level files an operation may act on.

use crate::age;
use crate::config::CompiledFilters;
use crate::placement::{OrganizeError, OrganizeResult};
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Names starting with this prefix are hidden and never touched.
pub const HIDDEN_PREFIX: char = '.';

/// A file found directly inside a scanned directory.
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// The file name as stored on disk.
    pub file_name: OsString,
    /// The file name, lossily decoded for matching and display.
    pub name: String,
    /// The full path to the file.
    pub path: PathBuf,
    /// Last access time (modification time where access time is unavailable).
    pub last_accessed: DateTime<Local>,
    /// Lowercased extension without the dot, if any.
    pub extension: Option<String>,
}

impl DirectoryEntry {
    /// See [`age::is_stale`].
    pub fn is_stale(&self, threshold_days: u64, reference: DateTime<Local>) -> bool {
        age::is_stale(self.last_accessed, threshold_days, reference)
    }
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// Lists the eligible files directly inside `dir`, sorted by name.
///
/// Directories, hidden entries and anything the filters exclude are left out.
/// Entries that disappear while being inspected are skipped. Only failing to
/// read `dir` itself is an error.
pub fn list_entries(dir: &Path, filters: &CompiledFilters) -> OrganizeResult<Vec<DirectoryEntry>> {
    let entries = fs::read_dir(dir).map_err(|e| OrganizeError::ReadDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut listed = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }

        let path = entry.path();
        // follows symlinks, so a link to a directory counts as a directory
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        if !filters.should_include(Path::new(&name)) {
            debug!("excluded by filters: {}", name);
            continue;
        }

        let extension = Path::new(&name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .filter(|ext| !ext.is_empty());

        listed.push(DirectoryEntry {
            last_accessed: age::last_access_time(&metadata),
            file_name,
            name,
            path,
            extension,
        });
    }

    listed.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listed)
}
