//! Which housekeeping tasks run on which weekday.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// A housekeeping operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Organize,
    Archive,
    Screenshots,
}

impl Task {
    /// Key under which the task's count is reported (`files_moved`, ...).
    pub fn counter_key(&self) -> &'static str {
        match self {
            Task::Organize => "files_moved",
            Task::Archive => "files_archived",
            Task::Screenshots => "screenshots_moved",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Task::Organize => "organize",
            Task::Archive => "archive",
            Task::Screenshots => "screenshots",
        }
    }
}

/// Weekdays on which each task runs under `desktidy run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "every_day")]
    pub organize: Vec<Weekday>,
    #[serde(default = "every_day")]
    pub screenshots: Vec<Weekday>,
    #[serde(default = "sundays")]
    pub archive: Vec<Weekday>,
}

fn every_day() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
}

fn sundays() -> Vec<Weekday> {
    vec![Weekday::Sun]
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            organize: every_day(),
            screenshots: every_day(),
            archive: sundays(),
        }
    }
}

impl Schedule {
    /// Tasks due on `day`, in execution order.
    ///
    /// Screenshots run before organize, which would otherwise file them under
    /// their extension's category. Archive runs before organize, which would
    /// otherwise move every stale download into a subfolder the archiver never
    /// scans.
    pub fn tasks_for(&self, day: Weekday) -> Vec<Task> {
        [
            (Task::Screenshots, &self.screenshots),
            (Task::Archive, &self.archive),
            (Task::Organize, &self.organize),
        ]
        .into_iter()
        .filter(|(_, days)| days.contains(&day))
        .map(|(task, _)| task)
        .collect()
    }
}
