use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct TakeoffConfig {
    pub storage: StorageSection,
    pub sandbox: SandboxSection,
    pub pricing: PricingSection,
}

impl TakeoffConfig {
    /// Resolves the database path relative to the directory holding the config file.
    pub fn database_path<P: AsRef<Path>>(&self, config_dir: P) -> PathBuf {
        let path = Path::new(&self.storage.database);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            config_dir.as_ref().join(path)
        }
    }

    fn validate(self) -> Result<Self> {
        if self.sandbox.hook_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "sandbox.hook_interval",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sandbox.max_instructions < u64::from(self.sandbox.hook_interval) {
            return Err(ConfigError::Invalid {
                field: "sandbox.max_instructions",
                message: format!(
                    "must be at least hook_interval ({})",
                    self.sandbox.hook_interval
                ),
            });
        }
        if self.pricing.fallback_currency.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pricing.fallback_currency",
                message: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: "data/takeoff.sqlite".to_string(),
        }
    }
}

/// Resource bounds applied to every model script evaluation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxSection {
    pub max_instructions: u64,
    pub timeout_ms: u64,
    pub memory_limit_mb: usize,
    /// Number of VM instructions between two budget checks.
    pub hook_interval: u32,
}

impl SandboxSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            max_instructions: 5_000_000,
            timeout_ms: 2_000,
            memory_limit_mb: 32,
            hook_interval: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub fallback_currency: String,
    pub fallback_category: String,
    pub fallback_unit_type: String,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
            fallback_currency: "MXN".to_string(),
            fallback_category: "Other".to_string(),
            fallback_unit_type: "unit".to_string(),
        }
    }
}

pub fn load_takeoff_config<P: AsRef<Path>>(path: P) -> Result<TakeoffConfig> {
    load_toml::<TakeoffConfig, _>(path)?.validate()
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
