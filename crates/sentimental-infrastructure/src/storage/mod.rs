//! Storage layer for atomic file operations.

mod atomic_toml;
mod secret_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use secret_storage::{OPENAI_API_KEY_ENV, OPENAI_MODEL_ENV, SecretStorage, SecretStorageError};
