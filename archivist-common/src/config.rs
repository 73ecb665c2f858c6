//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ARCHIVIST_ROOT";

/// Environment variable naming an explicit config file
pub const CONFIG_FILE_ENV: &str = "ARCHIVIST_CONFIG";

/// Logging section of the TOML config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`
///
/// Every key is optional; missing keys fall back to compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub worker_count: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub culture: Option<String>,
    /// `off`, `permissive` or `strict`
    pub csv_validator_default_import_behaviour: Option<String>,
    /// External program run on CSV files when `doCsvTransform` is requested
    pub csv_transform_command: Option<String>,
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load config from an explicit path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load config from the explicit path if given, else from the platform
    /// default location. A missing default file yields compiled defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            return Self::load(Path::new(&path));
        }

        match default_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            None => {
                tracing::warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolve the root folder
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Find the first existing config file for the platform
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("archivist").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/archivist/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/archivist (or /var/lib/archivist for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("archivist"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/archivist"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("archivist"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/archivist"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("archivist"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\archivist"))
    } else {
        PathBuf::from("./archivist_data")
    }
}

/// Directory layout below the root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("archivist.db")
    }

    /// Where uploaded import files land before a job picks them up
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads").join("tmp")
    }

    /// Base for downloadable artifacts; relative download paths start here
    pub fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    /// Scratch space for per-job temporary directories
    pub fn jobs_tmp_dir(&self) -> PathBuf {
        self.root.join("tmp").join("jobs")
    }

    pub fn i18n_dir(&self) -> PathBuf {
        self.root.join("i18n")
    }

    /// Create every directory of the layout
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.uploads_dir(),
            self.downloads_dir().join("jobs"),
            self.jobs_tmp_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Config(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}
