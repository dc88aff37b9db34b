//! Composition root: config, logging and collaborators wired into the controller.

use std::sync::Arc;

use anyhow::{Context, Result};

use sentimental_application::{ControllerSettings, ViewStateController};
use sentimental_core::auth::AuthGateway;
use sentimental_core::config::{AppConfig, BackendKind};
use sentimental_core::generation::GenerationService;
use sentimental_core::story::ContentStore;
use sentimental_infrastructure::{
    ConfigService, FileSessionStore, InMemoryBackend, SentimentalPaths,
};
use sentimental_interaction::{OpenAiGenerationService, RestBackend};

use crate::Cli;
use crate::logging::{self, LoggingGuard};

pub struct App {
    pub controller: ViewStateController,
    // Dropped after the controller so shutdown lines are flushed.
    _logging: LoggingGuard,
}

pub fn bootstrap(cli: &Cli) -> Result<App> {
    let paths = match &cli.home {
        Some(home) => SentimentalPaths::with_base(home),
        None => SentimentalPaths::new(),
    };

    let mut config_service = ConfigService::new(&paths)?;
    if let Some(config_path) = &cli.config {
        config_service = config_service.with_config_path(config_path.clone());
    }
    let config = apply_overrides(config_service.load_config()?, cli);

    let logging = logging::init(&paths.logs_dir()?, &config.logging.level)?;
    tracing::info!(
        "Starting Sentimental (backend: {:?}, config: {})",
        config.backend.kind,
        config_service.config_path().display()
    );

    let collaborators = match config.backend.kind {
        BackendKind::Memory => {
            let secret_path = paths
                .ensure_secret_file()
                .context("Failed to prepare secret.json")?;
            let secrets = config_service.load_secrets()?;
            let generation = OpenAiGenerationService::from_config(&config.generation, &secrets)
                .with_context(|| {
                    format!(
                        "Set OPENAI_API_KEY or add an api_key to {}",
                        secret_path.display()
                    )
                })?;
            tracing::info!("Using model {}", generation.model());
            Collaborators::in_memory(Arc::new(generation))
        }
        BackendKind::Rest => {
            tracing::info!("Using REST backend at {}", config.backend.base_url);
            Collaborators::rest(&config.backend.base_url)
        }
    };
    let sessions = FileSessionStore::from_paths(&paths)?;

    let controller = ViewStateController::new(
        collaborators.auth,
        collaborators.store,
        collaborators.generation,
        Arc::new(sessions),
        ControllerSettings::from(&config.controller),
    );

    Ok(App {
        controller,
        _logging: logging,
    })
}

fn apply_overrides(mut config: AppConfig, cli: &Cli) -> AppConfig {
    if let Some(kind) = cli.backend {
        config.backend.kind = kind;
    }
    if let Some(url) = &cli.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config
}

/// The controller's remote collaborators for one backend kind.
struct Collaborators {
    auth: Arc<dyn AuthGateway>,
    store: Arc<dyn ContentStore>,
    generation: Arc<dyn GenerationService>,
}

impl Collaborators {
    /// Local demo accounts and stories; generation calls the model directly.
    fn in_memory(generation: Arc<dyn GenerationService>) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        Self {
            auth: backend.clone(),
            store: backend,
            generation,
        }
    }

    /// Everything, generation included, goes through the hosted backend.
    fn rest(base_url: &str) -> Self {
        let backend = Arc::new(RestBackend::new(base_url));
        Self {
            auth: backend.clone(),
            store: backend.clone(),
            generation: backend,
        }
    }
}
