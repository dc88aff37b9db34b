//! Session domain module.
//!
//! # Module Structure
//!
//! - `model`: The signed-in identity (`Session`) and id validation
//! - `message`: Conversation message types (`MessageRole`, `ConversationMessage`)
//! - `store`: Persistence trait for the cached session
//!
//! # Usage
//!
//! ```ignore
//! use sentimental_core::session::{Session, SessionStore, ConversationMessage};
//! ```

mod message;
mod model;
mod store;

pub use message::{ConversationMessage, MessageRole};
pub use model::{DEMO_ID_PREFIX, EMPTY_SESSION_IDS, Session, is_valid_session_id};
pub use store::SessionStore;
