//! Secret configuration file storage.
//!
//! Reads `secret.json` and falls back to `OPENAI_API_KEY` /
//! `OPENAI_MODEL_NAME` when the file has no OpenAI entry.

use sentimental_core::SentimentalError;
use sentimental_core::config::{OpenAiConfig, SecretConfig};
use std::fs;
use std::path::PathBuf;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL_NAME";

/// Errors that can occur during secret storage operations.
#[derive(Debug)]
pub enum SecretStorageError {
    NotFound(PathBuf),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for SecretStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretStorageError::NotFound(path) => {
                write!(f, "Secret file not found at: {}", path.display())
            }
            SecretStorageError::Io(e) => write!(f, "I/O error: {}", e),
            SecretStorageError::Parse(e) => write!(f, "JSON parse error: {}", e),
        }
    }
}

impl std::error::Error for SecretStorageError {}

impl From<std::io::Error> for SecretStorageError {
    fn from(e: std::io::Error) -> Self {
        SecretStorageError::Io(e)
    }
}

impl From<serde_json::Error> for SecretStorageError {
    fn from(e: serde_json::Error) -> Self {
        SecretStorageError::Parse(e)
    }
}

impl From<SecretStorageError> for SentimentalError {
    fn from(e: SecretStorageError) -> Self {
        SentimentalError::config(e.to_string())
    }
}

/// Read-only access to `secret.json`.
///
/// The file holds plaintext keys and should be mode 600.
pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Parses the file as-is.
    pub fn load(&self) -> Result<SecretConfig, SecretStorageError> {
        if !self.path.exists() {
            return Err(SecretStorageError::NotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path)?;
        let config = serde_json::from_str(&content)?;

        Ok(config)
    }

    /// Loads the file, then fills a missing or blank OpenAI key from the
    /// environment. A missing file is not an error here.
    pub fn load_with_env(&self) -> Result<SecretConfig, SecretStorageError> {
        let mut config = match self.load() {
            Ok(config) => config,
            Err(SecretStorageError::NotFound(_)) => SecretConfig::default(),
            Err(e) => return Err(e),
        };

        let has_key = config
            .openai
            .as_ref()
            .is_some_and(|openai| !openai.api_key.trim().is_empty());

        if !has_key {
            if let Some(api_key) = env_non_empty(OPENAI_API_KEY_ENV) {
                tracing::debug!("Using OpenAI key from {}", OPENAI_API_KEY_ENV);
                let model_name = config
                    .openai
                    .and_then(|openai| openai.model_name)
                    .or_else(|| env_non_empty(OPENAI_MODEL_ENV));
                config.openai = Some(OpenAiConfig {
                    api_key,
                    model_name,
                });
            }
        }

        Ok(config)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
