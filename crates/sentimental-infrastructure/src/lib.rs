pub mod config_service;
pub mod dto;
pub mod file_session_store;
pub mod memory_backend;
pub mod paths;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::file_session_store::FileSessionStore;
pub use crate::memory_backend::InMemoryBackend;
pub use crate::paths::SentimentalPaths;
