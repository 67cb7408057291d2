//! Category resolution for incoming files.
//!
//! A [`RuleSet`] is an ordered list of [`CategoryRule`]s loaded from configuration.
//! The [`CategoryResolver`] compiles it into an ordered chain of strategies
//! (keywords first, then extensions) and falls back to [`FALLBACK_CATEGORY`]
//! when nothing matches.
//!
//! # Examples
//!
//! ```
//! use desktidy::category::{CategoryResolver, CategoryRule, RuleSet};
//!
//! let rules = RuleSet::new(vec![
//!     CategoryRule::with_extensions("Images", &[".png", ".jpg"]),
//!     CategoryRule::with_extensions("Docs", &[".txt"]),
//! ]);
//! let resolver = CategoryResolver::new(&rules);
//! assert_eq!(resolver.resolve("photo.PNG"), "Images");
//! assert_eq!(resolver.resolve("notes.txt"), "Docs");
//! assert_eq!(resolver.resolve("data.csv"), "Others");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Label used when no rule matches a file.
pub const FALLBACK_CATEGORY: &str = "Others";

/// A single category and the criteria that route files into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category label, also the name of the destination subfolder.
    pub name: String,
    /// File extensions, with or without the leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Substrings matched case-insensitively against the file name.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CategoryRule {
    /// Creates a rule that matches on file extensions only.
    pub fn with_extensions(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            keywords: Vec::new(),
        }
    }

    /// Creates a rule that matches on file name keywords only.
    pub fn with_keywords(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            keywords: keywords.iter().map(|kw| kw.to_string()).collect(),
        }
    }
}

/// Ordered collection of category rules.
///
/// Order matters: when two rules match the same file, the earlier one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
}

impl RuleSet {
    /// Creates a rule set from rules in priority order.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Returns the built-in rule set used when a configuration omits `categories`.
    pub fn standard() -> Self {
        Self::new(vec![
            CategoryRule::with_extensions(
                "Images",
                &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "tiff", "ico", "heic"],
            ),
            CategoryRule::with_extensions("Audio", &["mp3", "wav", "ogg", "flac", "aac", "m4a", "wma"]),
            CategoryRule::with_extensions(
                "Videos",
                &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "3gp"],
            ),
            CategoryRule::with_extensions(
                "Documents",
                &["pdf", "txt", "doc", "docx", "html", "htm", "md", "rtf", "odt"],
            ),
            CategoryRule::with_extensions("Archives", &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
            CategoryRule::with_extensions(
                "Code",
                &[
                    "py", "java", "c", "cpp", "h", "hpp", "js", "ts", "rs", "go", "sh", "bash", "json",
                    "xml", "yaml", "yml", "toml",
                ],
            ),
            CategoryRule::with_extensions("Spreadsheets", &["csv", "xls", "xlsx", "ods"]),
            CategoryRule::with_extensions("Presentations", &["ppt", "pptx", "odp", "key"]),
            CategoryRule::with_extensions("Fonts", &["ttf", "otf", "woff", "woff2"]),
            CategoryRule::with_extensions("Installers", &["dmg", "pkg", "exe", "msi", "deb"]),
        ])
    }

    /// Iterates over the rules in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Normalizes a configured extension: trims it, drops leading dots, lowercases it.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// One step of the resolution chain.
///
/// A strategy either claims a file name for a category or passes.
pub trait ResolveStrategy: Debug + Send + Sync {
    fn resolve(&self, file_name: &str) -> Option<&str>;
}

/// Matches lowercased keywords as substrings of the lowercased file name.
///
/// Groups are tested in order and the first group with any hit wins.
#[derive(Debug, Clone, Default)]
pub struct KeywordStrategy {
    groups: Vec<(String, Vec<String>)>,
}

impl KeywordStrategy {
    /// Builds the strategy from `(label, keywords)` pairs, keeping their order.
    ///
    /// Empty keywords are dropped, and groups left without keywords are skipped.
    pub fn new<'a, I, K>(groups: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, K)>,
        K: IntoIterator<Item = &'a String>,
    {
        let groups = groups
            .into_iter()
            .filter_map(|(label, keywords)| {
                let keywords: Vec<String> = keywords
                    .into_iter()
                    .map(|kw| kw.trim().to_lowercase())
                    .filter(|kw| !kw.is_empty())
                    .collect();
                (!keywords.is_empty()).then(|| (label.to_string(), keywords))
            })
            .collect();
        Self { groups }
    }

    /// Builds the strategy from the keyword lists of a rule set.
    pub fn from_rules(rules: &RuleSet) -> Self {
        Self::new(rules.iter().map(|rule| (rule.name.as_str(), rule.keywords.iter())))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl ResolveStrategy for KeywordStrategy {
    fn resolve(&self, file_name: &str) -> Option<&str> {
        let lowered = file_name.to_lowercase();
        self.groups
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw.as_str())))
            .map(|(label, _)| label.as_str())
    }
}

/// Looks the lowercased file extension up in an extension table.
#[derive(Debug, Clone, Default)]
pub struct ExtensionStrategy {
    extension_map: HashMap<String, String>,
}

impl ExtensionStrategy {
    /// Builds the extension table. An extension listed by several rules
    /// belongs to the first of them.
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut extension_map = HashMap::new();
        for rule in rules.iter() {
            for ext in &rule.extensions {
                let ext = normalize_extension(ext);
                if ext.is_empty() {
                    continue;
                }
                extension_map.entry(ext).or_insert_with(|| rule.name.clone());
            }
        }
        Self { extension_map }
    }

    /// Maps a bare extension to its category label.
    pub fn extension_to_category(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&normalize_extension(ext))
            .map(String::as_str)
    }
}

impl ResolveStrategy for ExtensionStrategy {
    fn resolve(&self, file_name: &str) -> Option<&str> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        if ext.is_empty() {
            return None;
        }
        self.extension_to_category(ext)
    }
}

/// Resolves file names to category labels through an ordered strategy chain.
#[derive(Debug)]
pub struct CategoryResolver {
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl CategoryResolver {
    /// Compiles a rule set into the keyword → extension chain.
    ///
    /// The keyword strategy is only installed when some rule defines keywords.
    pub fn new(rules: &RuleSet) -> Self {
        let mut strategies: Vec<Box<dyn ResolveStrategy>> = Vec::new();
        let keywords = KeywordStrategy::from_rules(rules);
        if !keywords.is_empty() {
            strategies.push(Box::new(keywords));
        }
        strategies.push(Box::new(ExtensionStrategy::from_rules(rules)));
        Self { strategies }
    }

    /// Creates a resolver from an explicit strategy chain.
    pub fn with_strategies(strategies: Vec<Box<dyn ResolveStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the category label for a file name, or [`FALLBACK_CATEGORY`].
    pub fn resolve(&self, file_name: &str) -> &str {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.resolve(file_name))
            .unwrap_or(FALLBACK_CATEGORY)
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(&RuleSet::standard())
    }
}

/// One-shot resolution against a rule set.
///
/// Prefer building a [`CategoryResolver`] once when resolving many names.
pub fn resolve(file_name: &str, rules: &RuleSet) -> String {
    CategoryResolver::new(rules).resolve(file_name).to_string()
}
