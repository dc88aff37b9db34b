//! Domain layer for Sentimental.
//!
//! Holds the value types the application moves around (sessions,
//! conversations, stories, formats, views), the error taxonomy, and the
//! traits for the external collaborators the controller depends on.

pub mod auth;
pub mod config;
pub mod error;
pub mod generation;
pub mod session;
pub mod story;
pub mod view;

// Re-export common error type
pub use error::{ErrorKind, Result, SentimentalError};
pub use view::View;
