//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SONGSHELF_ROOT_FOLDER`, then `SONGSHELF_ROOT`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file is never fatal: it is logged and the
//! next tier is used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Primary root folder environment variable
pub const ENV_ROOT_FOLDER: &str = "SONGSHELF_ROOT_FOLDER";

/// Alternative root folder environment variable
pub const ENV_ROOT: &str = "SONGSHELF_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "songshelf.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address (default 127.0.0.1)
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP port (default 5740)
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load the platform config file, falling back to defaults on any failure
    pub fn load_or_default() -> Self {
        let Some(path) = config_file_path() else {
            debug!("No config file found, using defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                debug!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn bind_address(&self) -> &str {
        self.bind_address.as_deref().unwrap_or(CompiledDefaults::BIND_ADDRESS)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(CompiledDefaults::PORT)
    }
}

/// Built-in defaults used when no other tier supplies a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub const BIND_ADDRESS: &'static str = "127.0.0.1";
    pub const PORT: u16 = 5740;

    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
        }
    }
}

/// Resolves the root folder through the four configuration tiers
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_override: None,
        }
    }

    /// Set the command-line value (tier 1)
    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_override {
            debug!("{}: root folder from command line", self.module_name);
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    debug!("{}: root folder from {}", self.module_name, var);
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = TomlConfig::load_or_default().root_folder {
            debug!("{}: root folder from config file", self.module_name);
            return path;
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Prepares the resolved root folder for use
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Locate the platform config file, if one exists
///
/// Linux checks `~/.config/songshelf/config.toml` first, then
/// `/etc/songshelf/config.toml`.
fn config_file_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("songshelf").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/songshelf/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/songshelf (or /var/lib/songshelf for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("songshelf"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/songshelf"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/songshelf
        dirs::data_dir()
            .map(|d| d.join("songshelf"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/songshelf"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\songshelf
        dirs::data_local_dir()
            .map(|d| d.join("songshelf"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\songshelf"))
    } else {
        PathBuf::from("./songshelf_data")
    }
}
