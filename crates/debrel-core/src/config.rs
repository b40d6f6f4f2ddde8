//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with sensible defaults
//!
//! # Supported formats
//!
//! The following configuration file formats are supported:
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.debrel.<ext>` in current directory or any parent
//! - `debrel.<ext>` in current directory or any parent
//! - `~/.config/debrel/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use debrel_core::config::{Config, ConfigLoader};
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The configuration for debrel.
///
/// Every section has working defaults, so an empty file (or none at all)
/// reproduces the stock release workflow.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Remote and branch used for fetch and push.
    pub git: GitConfig,
    /// Changelog location and update commands.
    pub changelog: ChangelogConfig,
    /// Packaging commands.
    pub commands: CommandsConfig,
    /// APT repository the packages are uploaded to.
    pub repository: RepositoryConfig,
    /// Release workflow behavior.
    pub release: ReleaseConfig,
    /// Server inventory.
    pub inventory: InventoryConfig,
}

/// Git remote settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitConfig {
    /// Remote to fetch from and push to.
    pub remote: String,
    /// Branch pushed on release.
    pub branch: String,
    /// Fetch every remote instead of only `remote` before a release.
    pub fetch_all: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "master".to_string(),
            fetch_all: false,
        }
    }
}

/// Changelog settings.
///
/// Commands support `{version}` interpolation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChangelogConfig {
    /// Path to the Debian changelog, relative to the project root.
    pub path: Utf8PathBuf,
    /// Command that writes a release entry for `{version}`.
    pub new_version_cmd: String,
    /// Commit message for the changelog update.
    pub commit_message: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            path: Utf8PathBuf::from("debian/changelog"),
            new_version_cmd: "gbp dch --release --new-version={version}".to_string(),
            commit_message: "Update changelog for {version} release.".to_string(),
        }
    }
}

/// Packaging commands run in the project root.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Remove previous build products.
    pub distclean: String,
    /// Build the binary packages.
    pub build: String,
    /// Print the binary package names, one per line.
    pub package_list: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            distclean: "make distclean".to_string(),
            build: "gbp buildpackage --git-ignore-branch --git-export-dir=pkg-build -us -uc"
                .to_string(),
            package_list: "dh_listpackages".to_string(),
        }
    }
}

/// APT repository settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Inventory role whose hosts receive the upload.
    pub role: String,
    /// Remote login user.
    pub user: String,
    /// Repository root; each distribution is a subdirectory.
    pub root: Utf8PathBuf,
    /// GPG key id used to sign `Release`.
    pub signing_key: String,
    /// Local directory holding the built `.deb` files.
    pub artifact_dir: Utf8PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            role: "central".to_string(),
            user: "aptcentral".to_string(),
            root: Utf8PathBuf::from("/var/www/packages/apt"),
            signing_key: "Monitoring".to_string(),
            artifact_dir: Utf8PathBuf::from("pkg-build"),
        }
    }
}

/// Release workflow configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Prompt for confirmation before push and upload (default: true).
    ///
    /// The `--yes`/`-y` CLI flag overrides this at runtime.
    pub confirm: bool,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self { confirm: true }
    }
}

/// Server inventory.
///
/// Each role maps to a list of host names. An entry of the form `@other`
/// includes every host of role `other`.
///
/// # Example
///
/// ```toml
/// [inventory.roles]
/// central = ["apt.example.com"]
/// workers = ["w1.example.com", "w2.example.com"]
/// ubuntu = ["@central", "@workers"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct InventoryConfig {
    /// Role name to hosts or `@role` includes.
    pub roles: BTreeMap<String, Vec<String>>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        let host = || vec!["canuxcheng.com".to_string()];
        let includes = |roles: &[&str]| roles.iter().map(|r| format!("@{r}")).collect();

        let mut roles = BTreeMap::new();
        roles.insert("central".to_string(), host());
        roles.insert("satellites".to_string(), host());
        roles.insert("workers".to_string(), host());
        roles.insert("omnibus".to_string(), host());
        roles.insert(
            "ubuntu".to_string(),
            includes(&["central", "satellites", "workers"]),
        );
        roles.insert("debian".to_string(), includes(&["ubuntu"]));
        roles.insert("redhat".to_string(), includes(&["omnibus"]));
        Self { roles }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "debrel";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/debrel/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/debrel/config.<ext>`)
    /// 4. Default values
    ///
    /// Inventory roles merge by key, so a file that defines one role keeps
    /// the default definitions of the others.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            remote = %config.git.remote,
            role = %config.repository.role,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The directory holding the marker is the last one searched.
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Stops at the first `.git` boundary above `start`, like [`ConfigLoader`].
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/debrel/` on Linux, `~/Library/Application Support/debrel/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// Returns `~/.local/share/debrel/` on Linux.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}
