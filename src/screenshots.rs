//! Routing rules for screenshots.
//!
//! A screenshot goes to the first project folder whose keywords appear in its
//! name, otherwise to a folder for the current month (`October_2026`). The
//! month comes from today's date, not from when the screenshot was taken.

use crate::category::{KeywordStrategy, ResolveStrategy};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Case-insensitive prefix that marks a file as a screenshot.
pub const SCREENSHOT_MARKER: &str = "screenshot";

/// A project folder and the keywords that route screenshots into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectGroup {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ProjectGroup {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        }
    }
}

/// The built-in project table.
pub fn default_project_groups() -> Vec<ProjectGroup> {
    vec![
        ProjectGroup::new("Meeting", &["meeting", "call", "discussion"]),
        ProjectGroup::new("Presentation", &["presentation", "slide", "ppt"]),
        ProjectGroup::new("Design", &["design", "mockup", "sketch"]),
    ]
}

pub fn is_screenshot(file_name: &str) -> bool {
    file_name.to_lowercase().starts_with(SCREENSHOT_MARKER)
}

/// Month folder name for a date, e.g. `October_2026`.
pub fn month_folder(now: DateTime<Local>) -> String {
    now.format("%B_%Y").to_string()
}

/// Picks destination folder names for screenshots.
#[derive(Debug, Clone, Default)]
pub struct ScreenshotSorter {
    projects: KeywordStrategy,
}

impl ScreenshotSorter {
    pub fn new(groups: &[ProjectGroup]) -> Self {
        Self {
            projects: KeywordStrategy::new(
                groups
                    .iter()
                    .map(|group| (group.name.as_str(), group.keywords.iter())),
            ),
        }
    }

    /// Project folder for `file_name`, if any group matches.
    pub fn project_for(&self, file_name: &str) -> Option<&str> {
        self.projects.resolve(file_name)
    }

    /// Destination folder name: the matching project, else the month of `now`.
    pub fn folder_for(&self, file_name: &str, now: DateTime<Local>) -> String {
        self.project_for(file_name)
            .map(str::to_string)
            .unwrap_or_else(|| month_folder(now))
    }
}
