//! Run configuration: root directory, category tables and exclusion rules.
//!
//! Settings are read from an optional TOML file and turned into an immutable
//! [`Configuration`] that the organizer borrows for the whole run.
//!
//! # Configuration File Format
//!
//! ```toml
//! root = "~/Downloads"
//!
//! [categories.document]
//! dir = "Docs"
//! extensions = [".pdf", ".txt", "md"]
//!
//! [categories.other]
//! dir = "/srv/unsorted"
//!
//! [exclude]
//! filenames = [".DS_Store"]
//! extensions = ["part", "crdownload"]
//! patterns = ["*.tmp"]
//! regex = ["^~\\$"]
//! ```
//!
//! Every key is optional. Category directories are relative to the root unless
//! absolute, and an `extensions` list replaces the built-in set.

use crate::category::{Category, CategoryRegistry, ExtensionOverlap, UnknownCategory};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".dlsortrc.toml";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {}: {source}", .path.display())]
    ConfigInvalid {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),

    #[error("the 'other' category is the catch-all and cannot list extensions")]
    OtherHasExtensions,

    #[error("Invalid glob pattern '{pattern}': {source}")]
    InvalidGlobPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegexPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("could not determine the home directory")]
    NoHomeDirectory,
}

/// Settings as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Directory to organize. `~` expands to the home directory.
    pub root: Option<String>,

    /// Per-category overrides keyed by category name.
    pub categories: BTreeMap<String, CategorySettings>,

    /// Top-level files to leave where they are.
    pub exclude: ExcludeRules,

    /// The file these settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Overrides for one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategorySettings {
    pub dir: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
}

/// Rules naming files the organizer must skip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExcludeRules {
    /// Exact filenames (e.g. ".DS_Store").
    pub filenames: Vec<String>,
    /// Extensions, with or without the leading dot.
    pub extensions: Vec<String>,
    /// Glob patterns matched against the filename.
    pub patterns: Vec<String>,
    /// Regexes matched against the filename.
    pub regex: Vec<String>,
}

impl Settings {
    /// Load settings, falling back to defaults.
    ///
    /// Looks in this order:
    /// 1. `config_path`, if given (it must exist)
    /// 2. `.dlsortrc.toml` in the current directory
    /// 3. `~/.config/dlsort/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config").join("dlsort").join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        tracing::debug!("no configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load settings from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut settings: Settings =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        settings.source = Some(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(settings)
    }

    /// Validate the settings and build the run configuration.
    ///
    /// `root_override` (typically the command-line directory) wins over the
    /// configured root; without either, the root is `~/Downloads`.
    pub fn build(self, root_override: Option<&Path>) -> Result<Configuration, ConfigError> {
        let root = match (root_override, self.root.as_deref()) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(root)) => expand_home(Path::new(root))?,
            (None, None) => dirs::home_dir()
                .ok_or(ConfigError::NoHomeDirectory)?
                .join("Downloads"),
        };

        let mut registry = CategoryRegistry::new(&root);
        for (name, overrides) in self.categories {
            let category: Category = name.parse()?;
            if let Some(dir) = overrides.dir {
                registry = registry.with_directory(category, root.join(expand_home(&dir)?));
            }
            if let Some(extensions) = overrides.extensions {
                if category == Category::Other {
                    return Err(ConfigError::OtherHasExtensions);
                }
                registry = registry.with_extensions(category, extensions);
            }
        }

        let exclusions = Exclusions::new(&self.exclude)?;
        let mut config = Configuration::from_parts(root, registry, exclusions);
        config.settings_file = self.source;
        Ok(config)
    }
}

/// Replaces a leading `~` component with the home directory.
fn expand_home(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
            if rest.as_os_str().is_empty() {
                Ok(home)
            } else {
                Ok(home.join(rest))
            }
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Compiled exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl Exclusions {
    /// Compile exclusion rules, rejecting invalid globs and regexes.
    pub fn new(rules: &ExcludeRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|source| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = rules
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            filenames: rules.filenames.iter().cloned().collect(),
            extensions: rules
                .extensions
                .iter()
                .filter_map(|ext| crate::category::normalize_extension(ext))
                .collect(),
            patterns,
            regexes,
        })
    }

    /// Whether a top-level file should be left in place.
    pub fn excludes(&self, file_name: &OsStr) -> bool {
        let name = file_name.to_string_lossy();

        if self.filenames.contains(name.as_ref()) {
            return true;
        }

        let ext = crate::category::extension_of(&name).to_lowercase();
        if !ext.is_empty() && self.extensions.contains(&ext) {
            return true;
        }

        self.patterns.iter().any(|pattern| pattern.matches(&name))
            || self.regexes.iter().any(|regex| regex.is_match(&name))
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
            && self.extensions.is_empty()
            && self.patterns.is_empty()
            && self.regexes.is_empty()
    }
}

/// Everything a run needs, fixed before the first file is touched.
#[derive(Debug, Clone)]
pub struct Configuration {
    root: PathBuf,
    registry: CategoryRegistry,
    exclusions: Exclusions,
    settings_file: Option<PathBuf>,
}

impl Configuration {
    /// Built-in category tables rooted at `root`, excluding nothing.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let registry = CategoryRegistry::new(&root);
        Self::from_parts(root, registry, Exclusions::default())
    }

    pub fn from_parts(root: PathBuf, registry: CategoryRegistry, exclusions: Exclusions) -> Self {
        Self {
            root,
            registry,
            exclusions,
            settings_file: None,
        }
    }

    /// The directory whose top-level entries are organized.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// The configuration file this run was built from, canonicalized.
    pub fn settings_file(&self) -> Option<&Path> {
        self.settings_file.as_deref()
    }

    /// Whether a top-level entry of the root holds configuration and must
    /// stay put: the loaded settings file, or any [`LOCAL_CONFIG_FILE`].
    ///
    /// `canonical_root` is the root as returned by [`fs::canonicalize`].
    pub fn is_settings_file(&self, canonical_root: Option<&Path>, file_name: &OsStr) -> bool {
        if file_name == LOCAL_CONFIG_FILE {
            return true;
        }
        match (self.settings_file(), canonical_root) {
            (Some(settings), Some(root)) => {
                settings.parent() == Some(root) && settings.file_name() == Some(file_name)
            }
            _ => false,
        }
    }

    /// Extensions claimed by several categories. Each one is a configuration
    /// warning: only the highest-priority category ever receives those files.
    pub fn overlaps(&self) -> &[ExtensionOverlap] {
        self.registry.overlaps()
    }
}
