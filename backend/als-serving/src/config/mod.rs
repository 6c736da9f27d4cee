use crate::services::model::LshConfig;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Candidate selection
    pub max_candidates: usize,

    // Result size used by callers that omit howMany
    pub default_how_many: usize,

    // Background model refresh
    pub refresh_interval_secs: u64,

    // LSH candidate narrowing
    pub lsh_enabled: bool,
    pub lsh_num_hashes: usize,
    pub lsh_max_bits_differing: u32,
    pub lsh_seed: u64,
}

impl Config {
    /// Load from `ALS_*` environment variables (and `.env`)
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("max_candidates", 10_000)?
            .set_default("default_how_many", 10)?
            .set_default("refresh_interval_secs", 600)? // 10 minutes
            .set_default("lsh_enabled", false)?
            .set_default("lsh_num_hashes", 16)?
            .set_default("lsh_max_bits_differing", 3)?
            .set_default("lsh_seed", 1234)?
            .add_source(config::Environment::with_prefix("ALS").try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_candidates == 0 {
            return Err(anyhow!("max_candidates must be greater than 0"));
        }

        if self.default_how_many == 0 {
            return Err(anyhow!("default_how_many must be greater than 0"));
        }

        if self.refresh_interval_secs == 0 {
            return Err(anyhow!("refresh_interval_secs must be greater than 0"));
        }

        if let Some(lsh) = self.lsh_config() {
            lsh.validate()?;
        }

        Ok(())
    }

    /// LSH settings for snapshots built under this config, if enabled
    pub fn lsh_config(&self) -> Option<LshConfig> {
        self.lsh_enabled.then_some(LshConfig {
            num_hashes: self.lsh_num_hashes,
            max_bits_differing: self.lsh_max_bits_differing,
            seed: self.lsh_seed,
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            max_candidates: 10_000,
            default_how_many: 10,
            refresh_interval_secs: 600,
            lsh_enabled: false,
            lsh_num_hashes: 16,
            lsh_max_bits_differing: 3,
            lsh_seed: 1234,
        }
    }

    #[test]
    fn test_config_validation() {
        let config = config();
        assert!(config.validate().is_ok());
        assert!(config.lsh_config().is_none());
        assert_eq!(config.refresh_interval(), Duration::from_secs(600));
    }

    #[test]
    fn test_invalid_max_candidates() {
        let mut config = config();
        config.max_candidates = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_refresh_interval() {
        let mut config = config();
        config.refresh_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lsh_settings() {
        let mut config = config();
        config.lsh_enabled = true;

        let lsh = config.lsh_config().unwrap();
        assert_eq!(lsh.num_hashes, 16);
        assert_eq!(lsh.max_bits_differing, 3);
        assert!(config.validate().is_ok());

        config.lsh_num_hashes = 128;
        assert!(config.validate().is_err());
    }
}
