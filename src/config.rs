//! Configuration loading, validation and file filtering.
//!
//! Configuration is a TOML document. Everything except `[directories]` has a
//! default:
//!
//! ```toml
//! days_old_for_archive = 30
//! summary_log = "~/.local/share/desktidy/summary.log"
//!
//! [directories]
//! desktop = "~/Desktop"
//! downloads = "~/Downloads"
//! screenshots = "~/Desktop/Screenshots"
//! archive = "~/Archive"
//!
//! [[categories]]
//! name = "Images"
//! extensions = [".png", ".jpg"]
//!
//! [[categories]]
//! name = "Invoices"
//! keywords = ["invoice", "receipt"]
//!
//! [[screenshot_projects]]
//! name = "Meeting"
//! keywords = ["meeting", "call", "discussion"]
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = ["crdownload", "part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [schedule]
//! organize = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
//! screenshots = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
//! archive = ["Sun"]
//! ```

use crate::category::{CategoryRule, RuleSet};
use crate::schedule::Schedule;
use crate::screenshots::{ProjectGroup, default_project_groups};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_NAME: &str = ".desktidy.toml";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// No configuration file was given and none was found in the usual places.
    #[error("No configuration found (looked for .desktidy.toml and ~/.config/desktidy/config.toml); run `desktidy init` to create one")]
    NoConfiguration,
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// Invalid glob pattern provided.
    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern provided with the actual error reason.
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading or writing configuration.
    #[error("IO error accessing configuration: {0}")]
    IoError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Files in the source directory not accessed for more than this many days are archived.
    #[serde(default = "default_archive_days")]
    pub days_old_for_archive: u64,

    /// Where run summaries are appended.
    #[serde(default = "default_summary_log")]
    pub summary_log: PathBuf,

    pub directories: Directories,

    /// Category rules in priority order.
    #[serde(default)]
    pub categories: RuleSet,

    /// Keyword groups that route screenshots to project folders.
    #[serde(default = "default_project_groups")]
    pub screenshot_projects: Vec<ProjectGroup>,

    #[serde(default)]
    pub filters: FilterConfig,

    #[serde(default)]
    pub schedule: Schedule,
}

fn default_archive_days() -> u64 {
    30
}

fn default_summary_log() -> PathBuf {
    PathBuf::from("~/.local/share/desktidy/summary.log")
}

/// The directories the housekeeping operations work on. A leading `~`
/// expands to `$HOME`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directories {
    pub desktop: PathBuf,
    pub downloads: PathBuf,
    pub screenshots: PathBuf,
    pub archive: PathBuf,
}

impl Directories {
    pub fn desktop_dir(&self) -> PathBuf {
        expand_home(&self.desktop)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        expand_home(&self.downloads)
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        expand_home(&self.screenshots)
    }

    pub fn archive_dir(&self) -> PathBuf {
        expand_home(&self.archive)
    }
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            desktop: PathBuf::from("~/Desktop"),
            downloads: PathBuf::from("~/Downloads"),
            screenshots: PathBuf::from("~/Desktop/Screenshots"),
            archive: PathBuf::from("~/Archive"),
        }
    }
}

/// Expands a leading `~` using the `HOME` environment variable.
pub fn expand_home(path: &Path) -> PathBuf {
    expand_with_home(path, std::env::var_os("HOME").map(PathBuf::from).as_deref())
}

fn expand_with_home(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.desktidy.toml` in the current directory
    /// 3. Look for `~/.config/desktidy/config.toml` in home directory
    ///
    /// # Errors
    ///
    /// Finding no configuration at all is an error: the directories to act
    /// on cannot be guessed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = Self::user_config_path()
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Err(ConfigError::NoConfiguration)
    }

    /// `~/.config/desktidy/config.toml`, if `HOME` is set.
    pub fn user_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("desktidy")
                .join("config.toml")
        })
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if parsing or validation fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes this configuration and writes it to `path`, creating parent
    /// directories. Refuses to replace an existing file unless `force` is set.
    pub fn write_to(&self, path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::IoError(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Checks the invariants the engine relies on.
    ///
    /// Category and project labels become folder names, so they must be
    /// non-empty, free of path separators, and unique (case-insensitively,
    /// since many desktop filesystems are case-insensitive).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for rule in self.categories.iter() {
            validate_label("category", &rule.name)?;
            if !seen.insert(rule.name.to_lowercase()) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "duplicate category '{}'",
                    rule.name
                )));
            }
            if rule.extensions.is_empty() && rule.keywords.is_empty() {
                return Err(ConfigError::ConfigInvalid(format!(
                    "category '{}' has neither extensions nor keywords",
                    rule.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for group in &self.screenshot_projects {
            validate_label("screenshot project", &group.name)?;
            if !seen.insert(group.name.to_lowercase()) {
                return Err(ConfigError::ConfigInvalid(format!(
                    "duplicate screenshot project '{}'",
                    group.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the resolved summary log path.
    pub fn summary_log_path(&self) -> PathBuf {
        expand_home(&self.summary_log)
    }

    /// Builds a configuration around explicit directories, with every other
    /// setting at its default.
    pub fn with_directories(directories: Directories) -> Self {
        Self {
            directories,
            ..Self::default()
        }
    }

    /// Replaces the category rules.
    pub fn with_categories(mut self, categories: Vec<CategoryRule>) -> Self {
        self.categories = RuleSet::new(categories);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            days_old_for_archive: default_archive_days(),
            summary_log: default_summary_log(),
            directories: Directories::default(),
            categories: RuleSet::standard(),
            screenshot_projects: default_project_groups(),
            filters: FilterConfig::default(),
            schedule: Schedule::default(),
        }
    }
}

fn validate_label(kind: &str, label: &str) -> Result<(), ConfigError> {
    let trimmed = label.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || label.contains('/')
        || label.contains('\\')
    {
        return Err(ConfigError::ConfigInvalid(format!(
            "invalid {} name '{}': must be a plain folder name",
            kind, label
        )));
    }
    Ok(())
}

/// Optional rules for leaving files alone.
///
/// Hidden files are always excluded before these rules run; an include
/// pattern cannot bring them back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., "Thumbs.db", "desktop.ini").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude (e.g., "*.tmp").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "crdownload", "part").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns to exclude.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    /// Glob patterns that override exclude rules.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl FilterConfig {
    /// Exclusions written by `desktidy init`: OS clutter and partial downloads.
    pub fn starter() -> Self {
        Self {
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string(), "desktop.ini".to_string()],
                patterns: Vec::new(),
                extensions: ["crdownload", "part", "partial", "download", "tmp"]
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect(),
                regex: Vec::new(),
            },
            include: IncludeRules::default(),
        }
    }

    /// Compile configuration into filter structures for matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(self)
    }
}

/// Pre-compiled filter rules.
#[derive(Debug)]
pub struct CompiledFilters {
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterConfig) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| crate::category::normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should be acted on (not excluded).
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Exact filename match - if matched, exclude
    /// 3. File extension match - if matched, exclude
    /// 4. Glob pattern match - if matched, exclude
    /// 5. Regex pattern match - if matched, exclude
    /// 6. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches(&self.include_patterns, file_path) {
            return true;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.matches(&self.exclude_patterns, file_path) {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }

    fn matches(&self, patterns: &[Pattern], file_path: &Path) -> bool {
        patterns.iter().any(|pattern| pattern.matches_path(file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::FALLBACK_CATEGORY;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
        [directories]
        desktop = "/tmp/desk"
        downloads = "/tmp/down"
        screenshots = "/tmp/desk/Screenshots"
        archive = "/tmp/archive"
    "#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.days_old_for_archive, 30);
        assert_eq!(config.directories.desktop_dir(), PathBuf::from("/tmp/desk"));
        assert!(!config.categories.is_empty());
        assert_eq!(config.screenshot_projects.len(), 3);
    }

    #[test]
    fn test_missing_directories_is_invalid() {
        let result = Config::parse("days_old_for_archive = 10");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_malformed_toml_is_invalid() {
        let result = Config::parse("[directories\ndesktop = ");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_categories_keep_their_order() {
        let content = format!(
            "{MINIMAL}\n{}",
            r#"
            [[categories]]
            name = "Images"
            extensions = [".png", ".jpg"]

            [[categories]]
            name = "Docs"
            extensions = [".txt"]
            keywords = ["notes"]
            "#
        );
        let config = Config::parse(&content).unwrap();
        let names: Vec<_> = config.categories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Images", "Docs"]);
        assert_eq!(config.categories.iter().nth(1).unwrap().keywords, vec!["notes"]);
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let config = Config::default().with_categories(vec![
            CategoryRule::with_extensions("Images", &["png"]),
            CategoryRule::with_extensions("images", &["jpg"]),
        ]);
        assert!(matches!(config.validate(), Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_category_label_must_be_folder_name() {
        for bad in ["", "  ", "..", "a/b", "a\\b"] {
            let config =
                Config::default().with_categories(vec![CategoryRule::with_extensions(bad, &["png"])]);
            assert!(config.validate().is_err(), "label {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_category_without_criteria_rejected() {
        let config = Config::default().with_categories(vec![CategoryRule::with_extensions("Empty", &[])]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_others_category_is_allowed() {
        let config = Config::default()
            .with_categories(vec![CategoryRule::with_extensions(FALLBACK_CATEGORY, &["bin"])]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/me");
        assert_eq!(
            expand_with_home(Path::new("~/Desktop"), Some(home)),
            PathBuf::from("/home/me/Desktop")
        );
        assert_eq!(expand_with_home(Path::new("~"), Some(home)), PathBuf::from("/home/me"));
        assert_eq!(
            expand_with_home(Path::new("/abs/path"), Some(home)),
            PathBuf::from("/abs/path")
        );
        assert_eq!(
            expand_with_home(Path::new("~other/x"), Some(home)),
            PathBuf::from("~other/x")
        );
        assert_eq!(expand_with_home(Path::new("~/x"), None), PathBuf::from("~/x"));
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let result = Config::load(Some(Path::new("/non/existent/config.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_write_and_reload_starter_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.filters = FilterConfig::starter();
        config.write_to(&path, false).unwrap();

        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.directories, config.directories);
        assert_eq!(reloaded.categories, config.categories);
        assert_eq!(reloaded.schedule, config.schedule);

        // refuses to clobber without force
        assert!(config.write_to(&path, false).is_err());
        assert!(config.write_to(&path, true).is_ok());
    }

    #[test]
    fn test_default_filters_include_everything() {
        let compiled = FilterConfig::default().compile().unwrap();
        assert!(compiled.should_include(Path::new("image.jpg")));
        assert!(compiled.should_include(Path::new("Thumbs.db")));
    }

    #[test]
    fn test_exclude_exact_filename() {
        let compiled = FilterConfig::starter().compile().unwrap();
        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_exclude_extensions() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                extensions: vec![".bak".to_string(), "tmp".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        let compiled = config.compile().unwrap();

        assert!(!compiled.should_include(Path::new("file.bak")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(!compiled.should_include(Path::new("file.BAK")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_exclude_glob_patterns() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                patterns: vec!["*.cache".to_string(), "[0-9]*.tmp".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        let compiled = config.compile().unwrap();

        assert!(!compiled.should_include(Path::new("file.cache")));
        assert!(!compiled.should_include(Path::new("1cache.tmp")));
        assert!(compiled.should_include(Path::new("cache.tmp")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                extensions: vec!["log".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec!["important*.log".to_string()],
            },
        };
        let compiled = config.compile().unwrap();

        assert!(compiled.should_include(Path::new("important-2024.log")));
        assert!(!compiled.should_include(Path::new("debug.log")));
    }

    #[test]
    fn test_exclude_regex() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                regex: vec![r"^test_.*\.txt$".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        let compiled = config.compile().unwrap();

        assert!(!compiled.should_include(Path::new("test_file.txt")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_invalid_regex_returns_error() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));
    }

    #[test]
    fn test_invalid_glob_pattern_returns_error() {
        let config = FilterConfig {
            exclude: ExcludeRules {
                patterns: vec!["[invalid".to_string()],
                ..Default::default()
            },
            include: IncludeRules::default(),
        };
        assert!(matches!(config.compile(), Err(ConfigError::InvalidGlobPattern(_))));
    }
}
