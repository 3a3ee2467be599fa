//! Configuration management for shellcache

pub mod schema;

pub use schema::Config;

use crate::error::{ShellcacheError, ShellcacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the project-local configuration
pub const LOCAL_CONFIG_FILE: &str = ".shellcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellcache")
            .join("config.toml")
    }

    /// Get the state directory path, honoring `general.state_dir`
    pub fn state_dir(config: &Config) -> PathBuf {
        if let Some(ref dir) = config.general.state_dir {
            return dir.clone();
        }

        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shellcache")
    }

    /// Get the partitions directory path
    pub fn partitions_dir(config: &Config) -> PathBuf {
        Self::state_dir(config).join("partitions")
    }

    /// Get the lifecycle record path
    pub fn lifecycle_path(config: &Config) -> PathBuf {
        Self::state_dir(config).join("lifecycle.json")
    }

    /// Get the lifecycle journal path
    pub fn journal_path(config: &Config) -> PathBuf {
        Self::state_dir(config).join("journal.log")
    }

    /// Walk upward from `start` looking for a project-local config
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> ShellcacheResult<Config> {
        self.load_merged(None).await
    }

    /// Load the global configuration with an optional local overlay
    ///
    /// Tables are merged key by key; any other value in the local file
    /// replaces the global one.
    pub async fn load_merged(&self, local: Option<&Path>) -> ShellcacheResult<Config> {
        let mut merged = if self.config_path.exists() {
            self.read_table(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            toml::Table::new()
        };

        if let Some(local_path) = local {
            let overlay = self.read_table(local_path).await?;
            merge_tables(&mut merged, overlay);
            debug!("Merged local config from {}", local_path.display());
        }

        let origin = local.unwrap_or(&self.config_path);
        let config: Config =
            toml::Value::Table(merged)
                .try_into()
                .map_err(|e: toml::de::Error| ShellcacheError::ConfigInvalid {
                    path: origin.to_path_buf(),
                    reason: e.to_string(),
                })?;

        config
            .validate()
            .map_err(|reason| ShellcacheError::ConfigInvalid {
                path: origin.to_path_buf(),
                reason,
            })?;

        Ok(config)
    }

    async fn read_table(&self, path: &Path) -> ShellcacheResult<toml::Table> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ShellcacheError::io(format!("reading config from {}", path.display()), e))?;

        content
            .parse::<toml::Table>()
            .map_err(|e| ShellcacheError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> ShellcacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            ShellcacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> ShellcacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShellcacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the state directories exist
    pub async fn ensure_state_dirs(config: &Config) -> ShellcacheResult<()> {
        for dir in [Self::state_dir(config), Self::partitions_dir(config)] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                ShellcacheError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
