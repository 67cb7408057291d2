//! Output formatting and styling module.
//!
//! All terminal output of the binary goes through [`OutputFormatter`], so
//! colors, symbols and table layout live in one place. Diagnostics go
//! through `tracing` instead.

use crate::housekeeper::{Progress, RunReport};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Per-folder tables for operation reports
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use desktidy::output::OutputFormatter;
    /// OutputFormatter::success("Desktop organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints every placement in a report, then a per-folder table.
    pub fn report(report: &RunReport, base: &Path) {
        let verb = if report.dry_run { "Would move" } else { "Moved" };
        for placement in &report.placements {
            let name = placement
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let shown = placement
                .destination()
                .strip_prefix(base)
                .map(|rel| rel.display().to_string())
                .unwrap_or_else(|_| placement.destination().display().to_string());
            println!(" - {}", name);
            println!("   → {} to {}", verb, shown);
        }

        for path in &report.skipped {
            Self::warning(&format!("{} vanished before it could be moved", path.display()));
        }
        for (path, reason) in &report.failures {
            Self::error(&format!("{}: {}", path.display(), reason));
        }

        if !report.placements.is_empty() {
            Self::folder_table(report);
        }
    }

    /// Prints a summary table with file counts per destination folder.
    pub fn folder_table(report: &RunReport) {
        Self::header("SUMMARY");

        let counts = report.by_folder();
        let width = counts.keys().map(|name| name.len()).max().unwrap_or(0).max(6);

        println!("{:<width$} | {}", "Folder".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));

        for (folder, count) in &counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }

        println!("{}", "-".repeat(width + 10));
        let total = report.moved();
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = width
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// Progress bar shown while an operation runs.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn start(&self, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }

    fn advance(&self, file_name: &str) {
        self.bar.set_message(file_name.to_string());
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
}
