//! desktidy - keeps the desktop and downloads folders tidy
//!
//! This library sorts files into category folders, archives files that have
//! not been used for a while, files screenshots into project or month folders
//! and keeps a running summary log. Folder rules, directories, filters and
//! the weekday schedule come from a TOML configuration file.

pub mod age;
pub mod category;
pub mod cli;
pub mod config;
pub mod entry;
pub mod housekeeper;
pub mod output;
pub mod placement;
pub mod schedule;
pub mod screenshots;
pub mod summary;
pub mod watcher;

pub use category::{CategoryResolver, CategoryRule, FALLBACK_CATEGORY, RuleSet};
pub use config::{CompiledFilters, Config, ConfigError, Directories, FilterConfig};
pub use housekeeper::{Housekeeper, RunReport};
pub use placement::{Disambiguation, OrganizeError, OrganizeResult, Placement};
pub use schedule::{Schedule, Task};
pub use summary::{RunStats, SharedStats, SummaryLog};

pub use cli::{Cli, run_cli};
