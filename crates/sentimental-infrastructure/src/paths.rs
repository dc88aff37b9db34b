//! Unified path management for sentimental configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/sentimental/       # Config directory
//! ├── config.toml              # Application configuration
//! ├── secret.json              # API keys
//! └── session.toml             # Cached signed-in session
//!
//! ~/.local/share/sentimental/  # Data directory
//! └── logs/                    # Application logs
//!     └── sentimental.log.YYYY-MM-DD
//! ```
//!
//! Every path can be re-rooted with [`SentimentalPaths::with_base`], which
//! puts both trees under one directory (used by tests and `--home`).

use std::path::{Path, PathBuf};

const APP_DIR: &str = "sentimental";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for sentimental_core::SentimentalError {
    fn from(e: PathError) -> Self {
        sentimental_core::SentimentalError::config(e.to_string())
    }
}

/// Resolves where sentimental keeps its files.
#[derive(Debug, Clone, Default)]
pub struct SentimentalPaths {
    base: Option<PathBuf>,
}

impl SentimentalPaths {
    /// Platform default locations (XDG on Linux).
    pub fn new() -> Self {
        Self { base: None }
    }

    /// All files under `base` (config and data share the directory).
    pub fn with_base(base: impl AsRef<Path>) -> Self {
        Self {
            base: Some(base.as_ref().to_path_buf()),
        }
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        match &self.base {
            Some(base) => Ok(base.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or(PathError::HomeDirNotFound),
        }
    }

    pub fn config_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("config.toml"))
    }

    /// Path to `secret.json`.
    ///
    /// The file holds plaintext API keys; [`Self::ensure_secret_file`]
    /// creates it with mode 600.
    pub fn secret_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("secret.json"))
    }

    pub fn session_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("session.toml"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("logs"))
    }

    /// Creates `secret.json` with an empty OpenAI entry if it is missing.
    pub fn ensure_secret_file(&self) -> Result<PathBuf, std::io::Error> {
        use sentimental_core::config::{OpenAiConfig, SecretConfig};

        let secret_path = self
            .secret_file()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;

        if secret_path.exists() {
            return Ok(secret_path);
        }

        if let Some(parent) = secret_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = SecretConfig {
            openai: Some(OpenAiConfig {
                api_key: String::new(),
                model_name: None,
            }),
        };
        let template_json = serde_json::to_string_pretty(&template).map_err(std::io::Error::other)?;
        std::fs::write(&secret_path, template_json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&secret_path, permissions)?;
        }

        Ok(secret_path)
    }
}
