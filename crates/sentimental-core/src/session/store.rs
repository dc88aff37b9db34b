//! Session store trait.
//!
//! Defines where the signed-in session survives between runs.

use async_trait::async_trait;

use super::model::Session;
use crate::error::Result;

/// Persistence for the current session.
///
/// The controller loads once on start, saves on every change, and clears on
/// logout or when the cached id turns out to be invalid.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the cached session.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: A session was cached
    /// - `Ok(None)`: Nothing cached
    /// - `Err(_)`: The cache exists but could not be read
    async fn load(&self) -> Result<Option<Session>>;

    /// Replaces the cached session.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Removes the cached session (no-op if absent).
    async fn clear(&self) -> Result<()>;
}
