//! Network-facing collaborators: the language model and the hosted backend.

pub mod openai_generation;
pub mod prompts;
pub mod rest_backend;

pub use openai_generation::OpenAiGenerationService;
pub use rest_backend::RestBackend;
