//! The three housekeeping operations: organize, archive and screenshots.
//!
//! Each operation scans one directory (non-recursively), decides a
//! destination for every eligible file and hands it to
//! [`placement::place`]. A failing file is logged and recorded in the
//! [`RunReport`]; it never stops the scan. Only failing to list the
//! directory aborts an operation.

use crate::category::CategoryResolver;
use crate::config::{CompiledFilters, Config, ConfigError};
use crate::entry::{DirectoryEntry, list_entries};
use crate::placement::{self, Disambiguation, OrganizeResult, Placement};
use crate::schedule::Task;
use crate::screenshots::{ScreenshotSorter, is_screenshot};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives per-file progress from a running operation.
pub trait Progress: Send + Sync {
    fn start(&self, total: u64);
    fn advance(&self, file_name: &str);
    fn finish(&self);
}

/// Progress sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&self, _total: u64) {}
    fn advance(&self, _file_name: &str) {}
    fn finish(&self) {}
}

/// Outcome of one operation on one directory.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task: Task,
    /// Files moved, or planned moves in a dry run.
    pub placements: Vec<Placement>,
    /// Files that vanished before they could be moved.
    pub skipped: Vec<PathBuf>,
    /// Files that could not be moved, with the reason.
    pub failures: Vec<(PathBuf, String)>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(task: Task, dry_run: bool) -> Self {
        Self {
            task,
            placements: Vec::new(),
            skipped: Vec::new(),
            failures: Vec::new(),
            dry_run,
        }
    }

    /// Number of files moved (or that would be moved in a dry run).
    pub fn moved(&self) -> usize {
        self.placements.len()
    }

    /// Placement counts per destination folder name.
    pub fn by_folder(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for placement in &self.placements {
            *counts.entry(placement.folder_name()).or_insert(0) += 1;
        }
        counts
    }

    /// Folds another report of the same kind into this one.
    pub fn merge(&mut self, other: RunReport) {
        self.placements.extend(other.placements);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
    }
}

/// Runs housekeeping operations with one resolved set of rules.
pub struct Housekeeper {
    resolver: CategoryResolver,
    filters: CompiledFilters,
    screenshots: ScreenshotSorter,
    dry_run: bool,
    progress: Arc<dyn Progress>,
}

impl Housekeeper {
    /// Builds a housekeeper from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter patterns do not compile.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            resolver: CategoryResolver::new(&config.categories),
            filters: config.filters.compile()?,
            screenshots: ScreenshotSorter::new(&config.screenshot_projects),
            dry_run: false,
            progress: Arc::new(NoProgress),
        })
    }

    /// Plan placements without touching the filesystem.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Moves every eligible file in `dir` into `dir/<category>`.
    ///
    /// Only top-level files are considered, so running it again without new
    /// files moves nothing.
    pub fn organize(&self, dir: &Path) -> OrganizeResult<RunReport> {
        info!("organizing {}", dir.display());
        let entries = list_entries(dir, &self.filters)?;
        let mut report = RunReport::new(Task::Organize, self.dry_run);

        self.progress.start(entries.len() as u64);
        for entry in &entries {
            let folder = dir.join(self.resolver.resolve(&entry.name));
            self.settle(&mut report, entry, &folder, Disambiguation::Precise);
        }
        self.progress.finish();

        info!("moved {} files in {}", report.moved(), dir.display());
        Ok(report)
    }

    /// Moves files in `source` not accessed for more than `threshold_days`
    /// into `archive`, flat.
    pub fn archive(&self, source: &Path, archive: &Path, threshold_days: u64) -> OrganizeResult<RunReport> {
        self.archive_at(source, archive, threshold_days, Local::now())
    }

    /// [`Housekeeper::archive`] with an explicit reference time.
    pub fn archive_at(
        &self,
        source: &Path,
        archive: &Path,
        threshold_days: u64,
        reference: DateTime<Local>,
    ) -> OrganizeResult<RunReport> {
        info!(
            "archiving files in {} older than {} days",
            source.display(),
            threshold_days
        );
        let stale: Vec<_> = list_entries(source, &self.filters)?
            .into_iter()
            .filter(|entry| entry.is_stale(threshold_days, reference))
            .collect();
        let mut report = RunReport::new(Task::Archive, self.dry_run);

        self.progress.start(stale.len() as u64);
        for entry in &stale {
            // collisions are stamped with the day the file was last used
            let mode = Disambiguation::Daily(entry.last_accessed.date_naive());
            self.settle(&mut report, entry, archive, mode);
        }
        self.progress.finish();

        info!("archived {} files into {}", report.moved(), archive.display());
        Ok(report)
    }

    /// Moves screenshots from `desktop` into project or month folders under
    /// `screenshots_dir`.
    pub fn organize_screenshots(&self, desktop: &Path, screenshots_dir: &Path) -> OrganizeResult<RunReport> {
        info!("sorting screenshots in {}", desktop.display());
        let shots: Vec<_> = list_entries(desktop, &self.filters)?
            .into_iter()
            .filter(|entry| is_screenshot(&entry.name))
            .collect();
        let mut report = RunReport::new(Task::Screenshots, self.dry_run);

        self.progress.start(shots.len() as u64);
        let now = Local::now();
        for entry in &shots {
            let folder = screenshots_dir.join(self.screenshots.folder_for(&entry.name, now));
            self.settle(&mut report, entry, &folder, Disambiguation::Precise);
        }
        self.progress.finish();

        info!("moved {} screenshots", report.moved());
        Ok(report)
    }

    fn settle(&self, report: &mut RunReport, entry: &DirectoryEntry, folder: &Path, mode: Disambiguation) {
        self.progress.advance(&entry.name);

        if self.dry_run {
            report
                .placements
                .push(placement::plan(&entry.file_name, &entry.path, folder, mode));
            return;
        }

        match placement::place(&entry.file_name, &entry.path, folder, mode) {
            Ok(placed) => {
                info!(
                    "moved {} to {}",
                    entry.path.display(),
                    placed.destination().display()
                );
                report.placements.push(placed);
            }
            Err(e) if e.is_race() => {
                debug!("skipping {}: {}", entry.name, e);
                report.skipped.push(entry.path.clone());
            }
            Err(e) => {
                warn!("{}", e);
                report.failures.push((entry.path.clone(), e.to_string()));
            }
        }
    }
}
