// Configuration module
// Author: kelexine (https://github.com/kelexine)

mod models;

pub use models::*;

use crate::error::{CacheError, Result};
use config::{Config, Environment, File};
use std::path::PathBuf;

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Config file
    /// 3. Defaults (lowest)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Same as [`AppConfig::load`] but reading the given (optional) config file.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::with_name(path).required(false))
            // Override with environment variables (e.g. SCOPECACHE_CACHE__DB_PATH)
            .add_source(
                Environment::with_prefix("SCOPECACHE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CacheError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| CacheError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would make the cache unusable.
    pub fn validate(&self) -> Result<()> {
        if self.cache.db_path.trim().is_empty() {
            return Err(CacheError::Config("cache.db_path must not be empty".to_string()));
        }
        if self.cache.operation_timeout_ms == 0 {
            return Err(CacheError::Config(
                "cache.operation_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.path.trim().is_empty() {
            return Err(CacheError::Config("store.path must not be empty".to_string()));
        }
        Ok(())
    }

    fn default_config_path() -> String {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".scopecache")
            .join("config.toml")
            .to_string_lossy()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cache.enabled);
        assert_eq!(config.namespace.default_fields, vec!["id".to_string()]);
        assert_eq!(config.namespace.identity_key, "user");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[cache]\nenabled = false\noperation_timeout_ms = 250\n\n[namespace]\ndefault_fields = [\"tenant\", \"id\"]"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.operation_timeout_ms, 250);
        assert_eq!(config.namespace.default_fields, vec!["tenant", "id"]);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.cache.operation_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
    }
}
