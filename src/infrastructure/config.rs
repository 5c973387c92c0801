use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::protocol::DEFAULT_PORT;

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_directory: String,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub store_directory: String,
}

/// Client-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prompted for interactively when unset
    pub server_address: Option<String>,
    pub upload_directory: String,
    pub download_directory: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_directory: "logs".to_string(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            store_directory: "assets".to_string(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: None,
            upload_directory: "uploads".to_string(),
            download_directory: "downloads".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the given configuration file, or the defaults when none is
    /// given. A file that cannot be read or parsed is an error.
    pub fn load_or_default(config_path: Option<&Path>) -> anyhow::Result<Self> {
        match config_path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, config_path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.log_directory.is_empty() {
            bail!("Log directory must not be empty");
        }

        if self.server.bind_address.is_empty() {
            bail!("Bind address must not be empty");
        }

        if self.server.port == 0 {
            bail!("Port must be greater than 0");
        }

        if self.server.store_directory.is_empty() {
            bail!("Store directory must not be empty");
        }

        if self.client.upload_directory.is_empty() || self.client.download_directory.is_empty() {
            bail!("Client directories must not be empty");
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Address the listener binds to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn store_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.store_directory)
    }
}

impl ClientConfig {
    pub fn upload_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.upload_directory)
    }

    pub fn download_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.download_directory)
    }

    /// Ensure the local upload and download directories exist
    pub fn ensure_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.upload_directory)?;
        std::fs::create_dir_all(&self.download_directory)?;
        Ok(())
    }
}
