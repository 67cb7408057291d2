//! Conflict-safe placement of files into destination folders.
//!
//! Placement creates the destination folder when needed, picks a file name
//! that does not collide with anything already there, and moves the file.
//! A collision is resolved by inserting a timestamp between the base name
//! and the extension (`photo.png` becomes `photo_20261019140322.png`).

use chrono::{Local, NaiveDate};
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while organizing files.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The directory to scan could not be listed.
    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDirFailed { path: PathBuf, source: io::Error },

    /// Failed to create a destination folder.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// The entry disappeared between listing and moving it.
    #[error("{} disappeared before it could be moved", .path.display())]
    EntryVanished { path: PathBuf },

    /// Failed to move a file to its destination.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The source path has no usable file name.
    #[error("Invalid file name: {}", .path.display())]
    InvalidFileName { path: PathBuf },

    /// Failed to append to the summary log.
    #[error("Failed to write summary log {}: {source}", .path.display())]
    SummaryWriteFailed { path: PathBuf, source: io::Error },

    /// The filesystem watcher reported an error.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl OrganizeError {
    /// True when the error only means another process got to the entry first.
    pub fn is_race(&self) -> bool {
        matches!(self, Self::EntryVanished { .. })
    }
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// How a colliding file name is made unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disambiguation {
    /// Second-precision stamp of the current local time (`%Y%m%d%H%M%S`).
    Precise,
    /// Day-level stamp of the given date (`%Y%m%d`).
    Daily(NaiveDate),
}

impl Disambiguation {
    fn stamp(&self) -> String {
        match self {
            Self::Precise => Local::now().format("%Y%m%d%H%M%S").to_string(),
            Self::Daily(date) => date.format("%Y%m%d").to_string(),
        }
    }
}

/// Where a file went (or would go, in a dry run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// The file's path before placement.
    pub source: PathBuf,
    /// The destination folder.
    pub folder: PathBuf,
    /// Final file name inside `folder`, after disambiguation, in raw OS form.
    #[serde(serialize_with = "lossy")]
    pub file_name: OsString,
    /// Whether a timestamp had to be inserted into the name.
    pub disambiguated: bool,
}

impl Placement {
    /// Full destination path.
    pub fn destination(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }

    pub fn display_name(&self) -> Cow<'_, str> {
        self.file_name.to_string_lossy()
    }

    /// Name of the destination folder itself (e.g. `Images`).
    pub fn folder_name(&self) -> String {
        self.folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.folder.display().to_string())
    }
}

fn lossy<S: Serializer>(name: &OsString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&name.to_string_lossy())
}

/// Splits a file name into base and extension the way `photo.tar.gz`
/// becomes `("photo.tar", Some("gz"))`. A leading dot never starts an
/// extension.
pub fn split_name(file_name: &OsStr) -> (&OsStr, Option<&OsStr>) {
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), ext) => (stem, ext),
        (None, _) => (file_name, None),
    }
}

/// Builds `base_<stamp>.ext`, or `base_<stamp>_<attempt>.ext` for retries.
pub fn stamped_name(file_name: &OsStr, stamp: &str, attempt: usize) -> OsString {
    let (base, ext) = split_name(file_name);
    let mut name = base.to_os_string();
    name.push("_");
    name.push(stamp);
    if attempt > 0 {
        name.push(format!("_{attempt}"));
    }
    if let Some(ext) = ext {
        name.push(".");
        name.push(ext);
    }
    name
}

/// True if anything, including a dangling symlink, occupies `path`.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Computes where `file_name` would land in `dest_folder` without touching
/// the filesystem.
pub fn plan(file_name: &OsStr, source: &Path, dest_folder: &Path, mode: Disambiguation) -> Placement {
    let mut placement = Placement {
        source: source.to_path_buf(),
        folder: dest_folder.to_path_buf(),
        file_name: file_name.to_os_string(),
        disambiguated: false,
    };
    if !occupied(&dest_folder.join(file_name)) {
        return placement;
    }

    let stamp = mode.stamp();
    let mut attempt = 0;
    loop {
        let candidate = stamped_name(file_name, &stamp, attempt);
        if !occupied(&dest_folder.join(&candidate)) {
            placement.file_name = candidate;
            placement.disambiguated = true;
            return placement;
        }
        attempt += 1;
    }
}

/// Moves `source` into `dest_folder` under a name that does not collide.
///
/// The folder is created if missing. On failure the source is left where it
/// was. The existence check and the rename are not one atomic step: a file
/// created at the chosen name by another process in between can be replaced.
///
/// # Examples
///
/// ```no_run
/// use desktidy::placement::{place, Disambiguation};
/// use std::path::Path;
///
/// let placed = place(
///     "photo.png".as_ref(),
///     Path::new("/home/me/Desktop/photo.png"),
///     Path::new("/home/me/Desktop/Images"),
///     Disambiguation::Precise,
/// );
/// match placed {
///     Ok(p) => println!("Moved to {}", p.destination().display()),
///     Err(e) => eprintln!("Placement failed: {}", e),
/// }
/// ```
pub fn place(
    file_name: &OsStr,
    source: &Path,
    dest_folder: &Path,
    mode: Disambiguation,
) -> OrganizeResult<Placement> {
    if !occupied(source) {
        return Err(OrganizeError::EntryVanished {
            path: source.to_path_buf(),
        });
    }

    fs::create_dir_all(dest_folder).map_err(|e| OrganizeError::DirectoryCreationFailed {
        path: dest_folder.to_path_buf(),
        source: e,
    })?;

    let placement = plan(file_name, source, dest_folder, mode);
    move_file(source, &placement.destination())?;
    Ok(placement)
}

/// Moves a file into a folder, keeping its own name as the starting candidate.
pub fn place_path(source: &Path, dest_folder: &Path, mode: Disambiguation) -> OrganizeResult<Placement> {
    let file_name = source.file_name().ok_or_else(|| OrganizeError::InvalidFileName {
            path: source.to_path_buf(),
        })?;
    place(file_name, source, dest_folder, mode)
}

fn move_file(from: &Path, to: &Path) -> OrganizeResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !occupied(from) => {
            Err(OrganizeError::EntryVanished {
                path: from.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => copy_then_remove(from, to),
        Err(e) => Err(OrganizeError::FileMoveFailure {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        }),
    }
}

/// Cross-filesystem move. Either both steps succeed or the copy is removed.
fn copy_then_remove(from: &Path, to: &Path) -> OrganizeResult<()> {
    let failure = |e: io::Error| OrganizeError::FileMoveFailure {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source: e,
    };

    if let Err(e) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(failure(e));
    }
    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(failure(e));
    }
    Ok(())
}
