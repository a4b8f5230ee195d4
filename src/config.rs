use thiserror::Error;

use crate::archive;
use crate::quota::QuotaLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub quota: QuotaLimits,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Maximum combined uncompressed size of an uploaded archive, in bytes
    pub max_extracted_size: u64,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the `origin/` and `converted/` trees
    pub upload_root: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_root: "./upload".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let upload_root = std::env::var("UPLOAD_ROOT").unwrap_or_else(|_| "./upload".to_string());

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20 * 1024 * 1024); // 20MB

        let max_extracted_size = std::env::var("MAX_EXTRACTED_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(archive::DEFAULT_MAX_EXTRACTED_SIZE);

        let defaults = QuotaLimits::default();
        let lifetime = std::env::var("QUOTA_LIFETIME_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.lifetime);
        let monthly = std::env::var("QUOTA_MONTHLY_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.monthly);

        let config = Config {
            node: NodeConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig { upload_root },
            quota: QuotaLimits { lifetime, monthly },
            test_mode,
            max_upload_size,
            max_extracted_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.node.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        if self.storage.upload_root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "UPLOAD_ROOT cannot be empty".to_string(),
            ));
        }

        if self.quota.lifetime == 0 || self.quota.monthly == 0 {
            return Err(ConfigError::ValidationError(
                "QUOTA_LIFETIME_LIMIT and QUOTA_MONTHLY_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 || self.max_extracted_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE and MAX_EXTRACTED_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.quota.monthly > self.quota.lifetime {
            tracing::warn!(
                "Monthly quota {} exceeds lifetime quota {}; the lifetime cap will always trip first.",
                self.quota.monthly,
                self.quota.lifetime
            );
        }

        Ok(())
    }
}
