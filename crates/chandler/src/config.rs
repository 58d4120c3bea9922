//! TOML configuration for the `chandler` command.

use std::path::{Path, PathBuf};

use chandler_engine::{BlobStoreConfig, ChunkerConfig};
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where and how the store is persisted.
    pub store: StoreSection,
    /// Content-defined chunking sizes. Must match the sizes the store was
    /// created with.
    pub chunker: ChunkerConfig,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[store]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Directory holding the Fjall database.
    pub data_dir: PathBuf,
    /// Fsync after every committed ingestion.
    pub sync_on_commit: bool,
}

impl Default for StoreSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".chandler"))
            .unwrap_or_else(|| PathBuf::from(".chandler"));
        Self {
            data_dir,
            sync_on_commit: true,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Options for opening the blob store.
    pub fn blob_store_config(&self) -> BlobStoreConfig {
        BlobStoreConfig {
            chunker: self.chunker,
            sync_on_commit: self.store.sync_on_commit,
        }
    }
}
