//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Namespace mixed into every derived address
    ///
    /// Two ledgers with different namespaces never share addresses. Changing
    /// it on an existing data directory makes every stored record fail
    /// address verification.
    pub namespace: String,

    /// Run the tally repair pass when the daemon starts
    pub repair_on_startup: bool,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Writer actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/vote-ledger"),
            service_name: "vote-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            namespace: "vote-ledger".to_string(),
            repair_on_startup: true,
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Sync the WAL on every commit
    pub sync_writes: bool,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            sync_writes: true,
            enable_statistics: false,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure for submitters)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML document; missing keys fall back to defaults
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("VOTE_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(namespace) = std::env::var("VOTE_LEDGER_NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(capacity) = std::env::var("VOTE_LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid VOTE_LEDGER_MAILBOX_CAPACITY: {}", e))
            })?;
        }

        if let Ok(repair) = std::env::var("VOTE_LEDGER_REPAIR_ON_STARTUP") {
            config.repair_on_startup = repair.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid VOTE_LEDGER_REPAIR_ON_STARTUP: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.namespace.is_empty() {
            return Err(crate::Error::Config("namespace cannot be empty".to_string()));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
