//! Bootstrap configuration and root folder resolution
//!
//! Configuration is deliberately small: where the database lives, how long a
//! single store round trip may take, and how to log. Sources, highest
//! priority first:
//!
//! 1. Command-line arguments
//! 2. Environment variable (`LMS_ROOT_FOLDER`)
//! 3. TOML configuration file (`<config_dir>/lms/config.toml` unless given)
//! 4. Built-in defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "LMS_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "lms.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Explicit database file path; overrides `<root>/lms.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Root folder for the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Bounded wait for each store round trip, in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Open the configured log file for appending, creating it and its
    /// parent folders as needed
    ///
    /// `None` when no file is configured; logs then go to stderr.
    pub fn open_log_file(&self) -> Result<Option<File>> {
        let Some(path) = &self.file else {
            return Ok(None);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Some(file))
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            root_folder: None,
            store_timeout_ms: default_store_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        if config.store_timeout_ms == 0 {
            return Err(Error::Config("store_timeout_ms must be positive".to_string()));
        }
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when the file is missing
    ///
    /// A present but malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Bounded wait applied to every store call
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Resolve the database file path for this configuration
    ///
    /// `root_folder` is the folder already chosen by [`resolve_root_folder`].
    pub fn database_file(&self, root_folder: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| database_path(root_folder))
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` from the loaded TOML configuration
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_root: Option<&Path>,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_root {
        return path.to_path_buf();
    }

    default_root_folder()
}

/// Database file inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE)
}

/// User configuration file location (`<config_dir>/lms/config.toml`)
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("lms").join("config.toml"))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lms"))
        .unwrap_or_else(|| PathBuf::from("./lms_data"))
}
