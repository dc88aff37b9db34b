//! Authentication gateway.
//!
//! Session issuance and identity lookup live outside the controller. Both
//! local ("demo") accounts and identity-provider accounts come back as the
//! same [`AuthUser`] shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Session;

/// New account request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Sign-in request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Identity asserted by a third-party provider (e.g. Google sign-in).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "google".to_string()
}

impl ProviderIdentity {
    /// Display name, falling back to the local part of the email.
    pub fn resolved_name(&self) -> String {
        self.display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                self.email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
    }

    /// Session built from the provider data alone, used when the backend
    /// sync is unavailable.
    pub fn to_session(&self) -> Session {
        Session {
            id: self.uid.clone(),
            display_name: self.resolved_name(),
            email: self.email.clone(),
            avatar_url: self.photo_url.clone(),
            email_verified: self.email_verified,
        }
    }
}

/// Identity returned by every successful auth call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
}

impl AuthUser {
    pub fn into_session(self) -> Session {
        Session::new(self.user_id, self.name, self.email)
    }
}

/// Session issuance and validation.
///
/// # Errors
///
/// - `register`: `Validation` on empty email/name, `Conflict` if the email is taken
/// - `login`: `Unauthorized` on bad credentials
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn register(&self, registration: Registration) -> Result<AuthUser>;

    async fn login(&self, credentials: Credentials) -> Result<AuthUser>;

    /// Maps a provider identity onto a backend user.
    async fn sync_identity(&self, identity: ProviderIdentity) -> Result<AuthUser>;

    /// Ends a provider-issued session. Demo sessions never reach this.
    async fn sign_out(&self, _session: &Session) -> Result<()> {
        Ok(())
    }
}
