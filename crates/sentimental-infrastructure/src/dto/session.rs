//! Persisted session DTO.

use serde::{Deserialize, Serialize};

use sentimental_core::session::Session;

pub const SESSION_SCHEMA_VERSION: &str = "1.0.0";

/// On-disk shape of `session.toml`.
///
/// Keeps the stored layout independent of the domain `Session` so a field
/// rename in core does not orphan cached sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionV1_0_0 {
    #[serde(default = "default_version")]
    pub version: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    /// RFC 3339 timestamp of the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

/// Type alias for the latest session version.
pub type SessionDTO = SessionV1_0_0;

fn default_version() -> String {
    SESSION_SCHEMA_VERSION.to_string()
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl From<&Session> for SessionV1_0_0 {
    fn from(session: &Session) -> Self {
        Self {
            version: default_version(),
            user_id: session.id.clone(),
            name: session.display_name.clone(),
            email: session.email.clone(),
            photo_url: session.avatar_url.clone(),
            email_verified: session.email_verified,
            saved_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

impl From<SessionV1_0_0> for Session {
    fn from(dto: SessionV1_0_0) -> Self {
        Session {
            id: dto.user_id,
            display_name: dto.name,
            email: dto.email,
            avatar_url: dto.photo_url,
            email_verified: dto.email_verified,
        }
    }
}
