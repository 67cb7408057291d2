//! Run statistics and the append-only summary log.

use crate::housekeeper::RunReport;
use crate::placement::{OrganizeError, OrganizeResult};
use crate::schedule::Task;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Line closing each block in the summary log.
pub const DELIMITER: &str = "----------------------------------------";

const DATE_FORMAT: &str = "%A, %d %B %Y %H:%M:%S";

/// Counters accumulated over one or more operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files_moved: usize,
    pub files_archived: usize,
    pub screenshots_moved: usize,
}

impl RunStats {
    /// Adds a report's count to the matching counter. Dry runs count nothing.
    pub fn record(&mut self, report: &RunReport) {
        if report.dry_run {
            return;
        }
        self.add(report.task, report.moved());
    }

    pub fn add(&mut self, task: Task, count: usize) {
        *self.counter_mut(task) += count;
    }

    pub fn counter(&self, task: Task) -> usize {
        match task {
            Task::Organize => self.files_moved,
            Task::Archive => self.files_archived,
            Task::Screenshots => self.screenshots_moved,
        }
    }

    fn counter_mut(&mut self, task: Task) -> &mut usize {
        match task {
            Task::Organize => &mut self.files_moved,
            Task::Archive => &mut self.files_archived,
            Task::Screenshots => &mut self.screenshots_moved,
        }
    }
}

/// [`RunStats`] shared between threads.
#[derive(Debug, Default)]
pub struct SharedStats(Mutex<RunStats>);

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, report: &RunReport) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(report);
    }

    pub fn snapshot(&self) -> RunStats {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The persisted, human-readable run history.
///
/// Each run appends one block:
///
/// ```text
/// Date: Monday, 19 October 2026 14:03:22
/// Files moved: 3
/// Files archived: 1
/// ----------------------------------------
/// ```
#[derive(Debug, Clone)]
pub struct SummaryLog {
    path: PathBuf,
}

impl SummaryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format_block(stats: &RunStats, at: DateTime<Local>) -> String {
        format!(
            "Date: {}\nFiles moved: {}\nFiles archived: {}\n{}\n",
            at.format(DATE_FORMAT),
            stats.files_moved,
            stats.files_archived,
            DELIMITER
        )
    }

    /// Appends one block, creating the file and its parent directory if needed.
    pub fn append(&self, stats: &RunStats, at: DateTime<Local>) -> OrganizeResult<()> {
        let failed = |e: std::io::Error| OrganizeError::SummaryWriteFailed {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(failed)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(failed)?;
        file.write_all(Self::format_block(stats, at).as_bytes())
            .map_err(failed)
    }
}
