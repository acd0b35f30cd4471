//! Engine configuration
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file
//! (explicit path or `NETPOLICY_CONFIG_PATH`), then `NETPOLICY_*`
//! environment variables. A `.env` file in the working directory is loaded
//! into the environment first.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::SchedulerConfig;

const ENV_PREFIX: &str = "NETPOLICY";
const CONFIG_PATH_VAR: &str = "NETPOLICY_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Cadence at which pending `when` conditions are re-checked
    pub when_poll_interval_ms: u64,
    /// How long the CLI waits for pending `when` statements
    pub max_wait_ms: u64,
    /// Default tracing filter when `RUST_LOG` is not set
    pub log_filter: String,
    pub pretty_checkpoints: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            when_poll_interval_ms: 100,
            max_wait_ms: 5000,
            log_filter: "info".to_string(),
            pretty_checkpoints: false,
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_millis(self.when_poll_interval_ms),
        }
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Config file to read (overrides `NETPOLICY_CONFIG_PATH`)
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore the process environment (and `.env`)
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config> {
        if !self.skip_env {
            dotenvy::dotenv().ok();
        }

        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("when_poll_interval_ms", defaults.when_poll_interval_ms)?
            .set_default("max_wait_ms", defaults.max_wait_ms)?
            .set_default("log_filter", defaults.log_filter)?
            .set_default("pretty_checkpoints", defaults.pretty_checkpoints)?;

        let path = match self.config_path {
            Some(path) => Some(path),
            None if !self.skip_env => std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from),
            None => None,
        };
        if let Some(path) = &path {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .ignore_empty(true),
            );
        }

        let settings = builder
            .build()
            .with_context(|| match &path {
                Some(path) => format!("Failed to read config file {}", path.display()),
                None => "Failed to assemble configuration".to_string(),
            })?;
        let config: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;

        if config.when_poll_interval_ms == 0 {
            anyhow::bail!("when_poll_interval_ms must be greater than zero");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::builder().without_env().build().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.scheduler().poll_interval, Duration::from_millis(100));
        assert_eq!(config.max_wait(), Duration::from_secs(5));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "when_poll_interval_ms = 25").unwrap();
        writeln!(file, "pretty_checkpoints = true").unwrap();

        let config = Config::builder()
            .without_env()
            .config_path(Some(file.path().to_path_buf()))
            .build()
            .unwrap();
        assert_eq!(config.when_poll_interval_ms, 25);
        assert!(config.pretty_checkpoints);
        assert_eq!(config.max_wait_ms, 5000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = Config::builder()
            .without_env()
            .config_path(Some(PathBuf::from("/nonexistent/netpolicy.toml")))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "when_poll_interval_ms = 0").unwrap();
        let result = Config::builder()
            .without_env()
            .config_path(Some(file.path().to_path_buf()))
            .build();
        assert!(result.is_err());
    }
}
