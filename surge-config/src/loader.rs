//! Configuration loading and environment variable handling

use crate::domains::logging::LoggingConfig;
use crate::domains::session::SessionConfig;
use crate::domains::SurgeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SURGE".to_string(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SurgeConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: SurgeConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SurgeConfig> {
        let mut config = SurgeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SurgeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    fn apply_env_overrides(&self, config: &mut SurgeConfig) -> ConfigResult<()> {
        self.apply_session_overrides(&mut config.session)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_session_overrides(&self, config: &mut SessionConfig) -> ConfigResult<()> {
        if let Ok(domain) = self.get_env_var("DOMAIN") {
            config.domain = domain;
        }

        if let Ok(username) = self.get_env_var("USERNAME") {
            config.username = username;
        }

        if let Ok(password) = self.get_env_var("PASSWORD") {
            config.password = password;
        }

        if let Some(use_http) = self.parse_env_var("HTTP")? {
            config.use_http = use_http;
        }

        if let Some(force_ipv4) = self.parse_env_var("IPV4")? {
            config.force_ipv4 = force_ipv4;
        }

        if let Some(insecure) = self.parse_env_var("INSECURE_TLS")? {
            config.insecure_tls = insecure;
        }

        if let Some(attempts) = self.parse_env_var("LOGIN_ATTEMPTS")? {
            config.login.max_attempts = attempts;
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Ok(level) = self.get_env_var("LOG_LEVEL") {
            config.level = Some(
                level
                    .parse()
                    .map_err(|e| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", e)))?,
            );
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = format
                .parse()
                .map_err(|e| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", e)))?;
        }

        Ok(())
    }

    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw.parse().map(Some).map_err(|e| {
                ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, name, e))
            }),
            Err(_) => Ok(None),
        }
    }

    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
