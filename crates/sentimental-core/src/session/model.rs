//! Session domain model.

use serde::{Deserialize, Serialize};

/// Ids that look present but mean "nobody is signed in".
///
/// Older clients cached these placeholders instead of clearing the
/// session, so every gated action has to treat them as empty.
pub const EMPTY_SESSION_IDS: [&str; 5] = ["", "anonymous", "anonymous_user", "null", "undefined"];

/// Prefix of locally-issued (non identity-provider) user ids.
pub const DEMO_ID_PREFIX: &str = "demo_";

/// The authenticated identity bound to the current UI instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User id as issued by the auth gateway.
    pub id: String,
    /// Name shown as story author.
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: email.into(),
            avatar_url: None,
            email_verified: false,
        }
    }

    /// Returns true if the id is a real user id.
    pub fn is_valid(&self) -> bool {
        is_valid_session_id(&self.id)
    }

    /// Returns true for locally-issued demo sessions.
    pub fn is_demo(&self) -> bool {
        self.id.starts_with(DEMO_ID_PREFIX)
    }

    /// Returns true if this session owns a resource with the given owner id.
    pub fn owns(&self, owner_user_id: &str) -> bool {
        self.is_valid() && self.id == owner_user_id
    }
}

/// Checks a raw id against the normalized-empty set.
pub fn is_valid_session_id(id: &str) -> bool {
    !EMPTY_SESSION_IDS.contains(&id.trim())
}
