use crate::constants::DEFAULT_RESOLVER_ENDPOINT;
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Endpoint of the address normalization service.
    pub endpoint: String,
    /// Per-attempt request timeout in seconds.
    pub timeout_seconds: u64,
    /// Attempts per address before giving up.
    pub max_attempts: u32,
    /// Backoff grows linearly: `backoff_step_seconds * attempt` between tries.
    pub backoff_step_seconds: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RESOLVER_ENDPOINT.to_string(),
            timeout_seconds: 120,
            max_attempts: 5,
            backoff_step_seconds: 5,
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory. The file is optional;
    /// defaults cover a stock run against the public service.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}
