//! Configuration loading.
//!
//! `config.toml` is read through [`AtomicTomlFile`]; a missing file yields
//! [`AppConfig::default`]. Secrets come from `secret.json` with environment
//! fallback.

use std::path::PathBuf;

use sentimental_core::Result;
use sentimental_core::config::{AppConfig, SecretConfig};

use crate::paths::SentimentalPaths;
use crate::storage::{AtomicTomlFile, SecretStorage};

/// Loads `AppConfig` and `SecretConfig` from the sentimental config dir.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config_path: PathBuf,
    secret_path: PathBuf,
}

impl ConfigService {
    /// Uses the default file locations under `paths`.
    pub fn new(paths: &SentimentalPaths) -> Result<Self> {
        Ok(Self {
            config_path: paths.config_file()?,
            secret_path: paths.secret_file()?,
        })
    }

    /// Overrides the `config.toml` location (e.g. `--config`).
    pub fn with_config_path(mut self, config_path: PathBuf) -> Self {
        self.config_path = config_path;
        self
    }

    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    pub fn load_config(&self) -> Result<AppConfig> {
        let file = AtomicTomlFile::<AppConfig>::new(self.config_path.clone());
        match file.load()? {
            Some(config) => {
                tracing::info!("Loaded config from {}", self.config_path.display());
                Ok(config)
            }
            None => {
                tracing::info!(
                    "No config at {}, using defaults",
                    self.config_path.display()
                );
                Ok(AppConfig::default())
            }
        }
    }

    /// Writes the default config if none exists yet.
    pub fn ensure_config_file(&self) -> Result<()> {
        let file = AtomicTomlFile::<AppConfig>::new(self.config_path.clone());
        if file.load()?.is_none() {
            file.save(&AppConfig::default())?;
            tracing::info!("Created default config at {}", self.config_path.display());
        }
        Ok(())
    }

    pub fn load_secrets(&self) -> Result<SecretConfig> {
        Ok(SecretStorage::with_path(self.secret_path.clone()).load_with_env()?)
    }
}
