//! Application configuration.
//!
//! Values are layered: built-in defaults, then `config.json` under the user's
//! config directory, then `HOTELDESK_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{storage::IdStrategy, update::UpdatePolicy};

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "hoteldesk";
const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "HOTELDESK";

/// Runtime settings for the managers and the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the three collection files.
    pub data_dir: PathBuf,
    /// Hotel collection file name.
    pub hotels_file: String,
    /// Customer collection file name.
    pub customers_file: String,
    /// Standalone reservation collection file name.
    pub reservations_file: String,
    /// Write through a temporary file and rename.
    pub atomic_writes: bool,
    /// Numbering of new records.
    pub id_strategy: IdStrategy,
    /// Treatment of empty values in partial updates.
    pub update_policy: UpdatePolicy,
    /// Reload the console when data files change on disk.
    pub watch_files: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            hotels_file: "hoteles.json".to_string(),
            customers_file: "clientes.json".to_string(),
            reservations_file: "reservaciones.json".to_string(),
            atomic_writes: true,
            id_strategy: IdStrategy::default(),
            update_policy: UpdatePolicy::default(),
            watch_files: true,
        }
    }
}

impl AppConfig {
    /// Default location of the data files.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Default location of the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join(CONFIG_FILE)
    }

    /// Load configuration from the default file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from `path` (optional) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults =
            Config::try_from(&AppConfig::default()).context("failed to encode default config")?;
        let settings = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(path)
                    .format(FileFormat::Json)
                    .required(false),
            )
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Path of the hotel collection.
    pub fn hotels_path(&self) -> PathBuf {
        self.data_dir.join(&self.hotels_file)
    }

    /// Path of the customer collection.
    pub fn customers_path(&self) -> PathBuf {
        self.data_dir.join(&self.customers_file)
    }

    /// Path of the standalone reservation collection.
    pub fn reservations_path(&self) -> PathBuf {
        self.data_dir.join(&self.reservations_file)
    }

    /// All collection paths.
    pub fn data_paths(&self) -> [PathBuf; 3] {
        [
            self.hotels_path(),
            self.customers_path(),
            self.reservations_path(),
        ]
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Write the default configuration if no config file exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    ensure_config_at(AppConfig::config_path())
}

/// Write the default configuration to `path` unless it already exists.
pub fn ensure_config_at(path: impl Into<PathBuf>) -> Result<PathBuf> {
    let path = path.into();
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let serialized = serde_json::to_string_pretty(&AppConfig::default())
        .context("failed to serialize default config")?;
    fs::write(&path, serialized).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
