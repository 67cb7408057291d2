//! Command-line interface for desktidy.
//!
//! Parses arguments, loads configuration, builds a [`Housekeeper`] and
//! prints what happened, either as colored text or as a JSON counter object.

use crate::config::{Config, ConfigError, FilterConfig};
use crate::housekeeper::{Housekeeper, RunReport};
use crate::output::{BarProgress, OutputFormatter};
use crate::placement::{OrganizeError, OrganizeResult};
use crate::schedule::Task;
use crate::summary::{RunStats, SharedStats, SummaryLog};
use crate::watcher::WatchService;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::warn;

/// Keeps the desktop and downloads folders tidy.
#[derive(Parser, Debug)]
#[command(name = "desktidy")]
#[command(version, about = "Sorts, archives and files away desktop clutter", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print counters as a JSON object instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sort files into category folders
    Organize {
        /// Directories to organize (default: desktop and downloads)
        dirs: Vec<PathBuf>,

        /// Show what would be moved without moving anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Move files not used for a while into the archive
    Archive {
        /// Directory to archive from (default: downloads)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Archive directory (default: from configuration)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Days since last access before a file is archived
        #[arg(long)]
        days: Option<u64>,

        #[arg(long)]
        dry_run: bool,
    },

    /// File screenshots from the desktop into project or month folders
    Screenshots {
        #[arg(long)]
        dry_run: bool,
    },

    /// Run today's scheduled operations and append to the summary log
    Run {
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch directories and organize new files as they appear
    Watch {
        /// Directories to watch (default: desktop and downloads)
        dirs: Vec<PathBuf>,
    },

    /// Write a starter configuration file
    Init {
        /// Where to write it (default: ~/.config/desktidy/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Organize(#[from] OrganizeError),

    #[error("Failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HOME is not set; pass --path to choose where to write the configuration")]
    NoHome,
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use desktidy::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["desktidy", "organize", "--dry-run"]);
/// if let Err(e) = run_cli(cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: Cli) -> Result<(), CliError> {
    if let Command::Init { path, force } = &cli.command {
        return init(path.as_deref(), *force);
    }

    let config = Config::load(cli.config.as_deref())?;
    run_with_config(&cli.command, &config, cli.json).map(|_| ())
}

/// Runs a command against already loaded configuration and returns the
/// counters of what was actually moved.
pub fn run_with_config(command: &Command, config: &Config, json: bool) -> Result<RunStats, CliError> {
    let dirs = &config.directories;
    let mut stats = RunStats::default();

    match command {
        Command::Organize { dirs: targets, dry_run } => {
            let keeper = housekeeper(config, *dry_run, json)?;
            let targets = or_defaults(targets, config);
            let report = organize_dirs(&keeper, &targets, json)?;
            finish(&report, json)?;
            stats.record(&report);
        }
        Command::Archive {
            source,
            dest,
            days,
            dry_run,
        } => {
            let keeper = housekeeper(config, *dry_run, json)?;
            let source = source.clone().unwrap_or_else(|| dirs.downloads_dir());
            let dest = dest.clone().unwrap_or_else(|| dirs.archive_dir());
            let days = days.unwrap_or(config.days_old_for_archive);
            let report = keeper.archive(&source, &dest, days)?;
            show(&report, &dest, json);
            finish(&report, json)?;
            stats.record(&report);
        }
        Command::Screenshots { dry_run } => {
            let keeper = housekeeper(config, *dry_run, json)?;
            let target = dirs.screenshots_dir();
            let report = keeper.organize_screenshots(&dirs.desktop_dir(), &target)?;
            show(&report, &target, json);
            finish(&report, json)?;
            stats.record(&report);
        }
        Command::Run { dry_run } => {
            stats = run_scheduled(config, *dry_run, json)?;
        }
        Command::Watch { dirs: targets } => {
            let keeper = Housekeeper::from_config(config)?;
            let targets = or_defaults(targets, config);
            let shared = SharedStats::new();
            let stop = AtomicBool::new(false);
            if !json {
                OutputFormatter::info("Watching for new files (Ctrl+C to stop)");
            }
            WatchService::new(&keeper, &shared).run(&targets, &stop)?;
            stats = shared.snapshot();
        }
        // handled by run_cli before any configuration is loaded
        Command::Init { .. } => {}
    }

    Ok(stats)
}

/// Runs every task scheduled for today, in order, then appends one block to
/// the summary log. A failing task is reported and the rest still run.
fn run_scheduled(config: &Config, dry_run: bool, json: bool) -> Result<RunStats, CliError> {
    let keeper = housekeeper(config, dry_run, json)?;
    let dirs = &config.directories;
    let mut stats = RunStats::default();
    let mut planned = RunStats::default();

    for task in config.schedule.tasks_for(Local::now().weekday()) {
        let result = match task {
            Task::Screenshots => keeper
                .organize_screenshots(&dirs.desktop_dir(), &dirs.screenshots_dir())
                .map(|report| {
                    show(&report, &dirs.screenshots_dir(), json);
                    report
                }),
            Task::Archive => keeper
                .archive(
                    &dirs.downloads_dir(),
                    &dirs.archive_dir(),
                    config.days_old_for_archive,
                )
                .map(|report| {
                    show(&report, &dirs.archive_dir(), json);
                    report
                }),
            Task::Organize => organize_dirs(&keeper, &[dirs.desktop_dir(), dirs.downloads_dir()], json),
        };

        match result {
            Ok(report) => {
                stats.record(&report);
                planned.add(report.task, report.moved());
            }
            Err(e) => {
                warn!("{} failed: {}", task.label(), e);
                if !json {
                    OutputFormatter::warning(&format!("{} failed: {}", task.label(), e));
                }
            }
        }
    }

    if dry_run {
        if json {
            println!("{}", serde_json::to_string(&planned)?);
        } else {
            OutputFormatter::dry_run_notice("No files were modified and the summary log was not written.");
        }
        return Ok(stats);
    }

    let log = SummaryLog::new(config.summary_log_path());
    log.append(&stats, Local::now())?;

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        OutputFormatter::success(&format!(
            "Run complete: {} moved, {} archived, {} screenshots filed",
            stats.files_moved, stats.files_archived, stats.screenshots_moved
        ));
        OutputFormatter::plain(&format!("Summary appended to {}", log.path().display()));
    }
    Ok(stats)
}

fn housekeeper(config: &Config, dry_run: bool, json: bool) -> Result<Housekeeper, CliError> {
    let keeper = Housekeeper::from_config(config)?.with_dry_run(dry_run);
    Ok(if json {
        keeper
    } else {
        keeper.with_progress(Arc::new(BarProgress::new()))
    })
}

fn or_defaults(targets: &[PathBuf], config: &Config) -> Vec<PathBuf> {
    if targets.is_empty() {
        vec![
            config.directories.desktop_dir(),
            config.directories.downloads_dir(),
        ]
    } else {
        targets.to_vec()
    }
}

/// Organizes each directory in turn. A directory that cannot be listed is
/// recorded as a failure; only when none can be listed is it an error.
fn organize_dirs(keeper: &Housekeeper, targets: &[PathBuf], json: bool) -> OrganizeResult<RunReport> {
    let mut total = RunReport::new(Task::Organize, keeper.is_dry_run());
    let mut first_error = None;
    let mut unreadable = 0;

    for dir in targets {
        match keeper.organize(dir) {
            Ok(report) => {
                show(&report, dir, json);
                total.merge(report);
            }
            Err(e) => {
                warn!("{}", e);
                total.failures.push((dir.clone(), e.to_string()));
                unreadable += 1;
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if unreadable == targets.len() => Err(e),
        _ => Ok(total),
    }
}

fn show(report: &RunReport, base: &Path, json: bool) {
    if json {
        return;
    }
    OutputFormatter::header(&format!("{}: {}", report.task.label(), base.display()));
    if report.placements.is_empty() && report.failures.is_empty() {
        OutputFormatter::plain("Nothing to do.");
        return;
    }
    OutputFormatter::report(report, base);
}

fn finish(report: &RunReport, json: bool) -> Result<(), CliError> {
    if json {
        let mut counters = serde_json::Map::new();
        counters.insert(report.task.counter_key().to_string(), report.moved().into());
        println!("{}", serde_json::Value::Object(counters));
        return Ok(());
    }

    if report.dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    } else if report.failures.is_empty() {
        OutputFormatter::success(&format!("Done: {} moved", report.moved()));
    } else {
        OutputFormatter::warning(&format!(
            "{} moved, {} could not be moved",
            report.moved(),
            report.failures.len()
        ));
    }
    Ok(())
}

fn init(path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::user_config_path().ok_or(CliError::NoHome)?,
    };

    let config = Config {
        filters: FilterConfig::starter(),
        ..Config::default()
    };
    config.write_to(&path, force)?;
    OutputFormatter::success(&format!("Configuration written to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organize() {
        let cli = Cli::parse_from(["desktidy", "organize", "/a", "/b", "--dry-run"]);
        assert_eq!(
            cli.command,
            Command::Organize {
                dirs: vec![PathBuf::from("/a"), PathBuf::from("/b")],
                dry_run: true,
            }
        );
        assert!(!cli.json);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["desktidy", "archive", "--days", "7", "--json", "-c", "x.toml"]);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Command::Archive { days: Some(7), .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["desktidy"]).is_err());
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        init(Some(&path), false).unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.filters.exclude.extensions.is_empty());

        assert!(matches!(init(Some(&path), false), Err(CliError::Config(_))));
    }
}
