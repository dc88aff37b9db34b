//! In-process demo backend.
//!
//! Implements both [`AuthGateway`] and [`ContentStore`] over a single
//! `RwLock`-guarded state so the application runs end to end without a
//! server. Accounts are issued `demo_` ids; identity-provider accounts keep
//! the provider uid. Everything is lost when the process exits.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use sentimental_core::auth::{AuthGateway, AuthUser, Credentials, ProviderIdentity, Registration};
use sentimental_core::session::DEMO_ID_PREFIX;
use sentimental_core::story::{
    AudioUpload, ContentStore, CreatedStory, FormatPayload, NewStory, Story, StoryUpdate,
    VisibilityChange, known_formats,
};
use sentimental_core::{Result, SentimentalError};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
struct DemoUser {
    user_id: String,
    email: String,
    name: String,
    password: Option<String>,
}

impl DemoUser {
    fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    /// Keyed by lowercased email.
    users: HashMap<String, DemoUser>,
    /// Newest first.
    stories: Vec<Story>,
}

impl BackendState {
    fn story(&self, story_id: &str) -> Result<&Story> {
        self.stories
            .iter()
            .find(|s| s.id == story_id)
            .ok_or_else(|| SentimentalError::not_found("story", story_id))
    }

    /// Looks up a story the actor is allowed to modify.
    fn owned_story_mut(&mut self, story_id: &str, actor: &str, action: &str) -> Result<&mut Story> {
        let story = self
            .stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| SentimentalError::not_found("story", story_id))?;

        if !story.is_owned_by(actor) {
            return Err(SentimentalError::access_denied(format!(
                "Only the story author can {action}."
            )));
        }
        Ok(story)
    }
}

/// Demo `AuthGateway` + `ContentStore`.
pub struct InMemoryBackend {
    state: RwLock<BackendState>,
    supported_formats: Vec<String>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BackendState::default()),
            supported_formats: known_formats().map(str::to_string).collect(),
        }
    }

    pub async fn story_count(&self) -> usize {
        self.state.read().await.stories.len()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn require_actor(actor: &str) -> Result<()> {
    if sentimental_core::session::is_valid_session_id(actor) {
        Ok(())
    } else {
        Err(SentimentalError::auth_required("Please sign in to continue."))
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn register(&self, registration: Registration) -> Result<AuthUser> {
        let email = registration.email.trim();
        let name = registration.name.trim();
        if email.is_empty() || name.is_empty() {
            return Err(SentimentalError::validation("Email and name are required"));
        }

        let key = normalize_email(email);
        let mut state = self.state.write().await;
        if state.users.contains_key(&key) {
            return Err(SentimentalError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let user = DemoUser {
            user_id: format!("{}{}", DEMO_ID_PREFIX, uuid::Uuid::new_v4().simple()),
            email: email.to_string(),
            name: name.to_string(),
            password: registration.password.filter(|p| !p.is_empty()),
        };
        tracing::info!("Registered demo user {}", user.user_id);
        let auth_user = user.to_auth_user();
        state.users.insert(key, user);
        Ok(auth_user)
    }

    async fn login(&self, credentials: Credentials) -> Result<AuthUser> {
        if credentials.email.trim().is_empty() {
            return Err(SentimentalError::validation("Email is required"));
        }

        let state = self.state.read().await;
        let user = state
            .users
            .get(&normalize_email(&credentials.email))
            .ok_or_else(|| SentimentalError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if let Some(expected) = &user.password {
            if credentials.password.as_deref() != Some(expected.as_str()) {
                return Err(SentimentalError::Unauthorized(
                    INVALID_CREDENTIALS.to_string(),
                ));
            }
        }

        Ok(user.to_auth_user())
    }

    async fn sync_identity(&self, identity: ProviderIdentity) -> Result<AuthUser> {
        if identity.email.trim().is_empty() || identity.uid.trim().is_empty() {
            return Err(SentimentalError::validation(
                "Provider identity needs a uid and an email",
            ));
        }

        let key = normalize_email(&identity.email);
        let mut state = self.state.write().await;
        let user = state.users.entry(key).or_insert_with(|| DemoUser {
            user_id: identity.uid.clone(),
            email: identity.email.trim().to_string(),
            name: identity.resolved_name(),
            password: None,
        });
        Ok(user.to_auth_user())
    }
}

#[async_trait]
impl ContentStore for InMemoryBackend {
    async fn list_public_stories(&self) -> Result<Vec<Story>> {
        let state = self.state.read().await;
        Ok(state.stories.iter().filter(|s| s.is_public).cloned().collect())
    }

    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>> {
        let state = self.state.read().await;
        Ok(state
            .stories
            .iter()
            .filter(|s| s.is_owned_by(user_id))
            .cloned()
            .collect())
    }

    async fn create_story(&self, story: NewStory) -> Result<CreatedStory> {
        require_actor(&story.user_id)?;
        if story.content.trim().is_empty() {
            return Err(SentimentalError::validation("Story content is required"));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let created = Story {
            id: id.clone(),
            title: story.title,
            content: story.content,
            author_name: story.author,
            owner_user_id: story.user_id,
            is_public: story.is_public,
            created_formats: BTreeSet::new(),
            formats: BTreeMap::new(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };

        self.state.write().await.stories.insert(0, created);
        tracing::debug!("Created story {}", id);
        Ok(CreatedStory { id })
    }

    async fn update_story(
        &self,
        story_id: &str,
        update: StoryUpdate,
        actor: &str,
    ) -> Result<Story> {
        require_actor(actor)?;
        let mut state = self.state.write().await;
        let story = state.owned_story_mut(story_id, actor, "edit this story")?;

        if let Some(title) = update.title {
            story.title = title;
        }
        if let Some(content) = update.content {
            story.content = content;
        }
        Ok(story.clone())
    }

    async fn set_story_visibility(
        &self,
        story_id: &str,
        is_public: bool,
        actor: &str,
    ) -> Result<VisibilityChange> {
        require_actor(actor)?;
        let mut state = self.state.write().await;
        let story = state.owned_story_mut(story_id, actor, "change its privacy")?;
        story.is_public = is_public;

        Ok(VisibilityChange {
            is_public,
            message: format!(
                "Story is now {}",
                if is_public { "public" } else { "private" }
            ),
        })
    }

    async fn get_format(&self, story_id: &str, format_type: &str) -> Result<FormatPayload> {
        let state = self.state.read().await;
        state
            .story(story_id)?
            .format(format_type)
            .cloned()
            .ok_or_else(|| SentimentalError::not_found("format", format_type))
    }

    async fn put_format(
        &self,
        story_id: &str,
        format_type: &str,
        payload: FormatPayload,
        actor: &str,
    ) -> Result<()> {
        require_actor(actor)?;
        let mut state = self.state.write().await;
        let story = state.owned_story_mut(story_id, actor, "create additional transformations")?;
        *story = story.with_format(format_type, payload);
        Ok(())
    }

    async fn upload_audio(
        &self,
        upload: AudioUpload,
        story_id: &str,
        format_type: &str,
        actor: &str,
    ) -> Result<String> {
        require_actor(actor)?;
        if !upload.content_type.starts_with("audio/") {
            return Err(SentimentalError::validation(
                "Please select an audio file (MP3, WAV, etc.)",
            ));
        }
        if upload.bytes.is_empty() {
            return Err(SentimentalError::validation("The audio file is empty"));
        }

        let mut state = self.state.write().await;
        let story = state.owned_story_mut(story_id, actor, "upload audio")?;
        let audio_url = format!("memory://audio/{}/{}/{}", story_id, format_type, upload.file_name);

        let payload = story
            .format(format_type)
            .map(|existing| existing.with_audio_url(audio_url.clone()))
            .unwrap_or_else(|| FormatPayload::text(String::new()).with_audio_url(audio_url.clone()));
        *story = story.with_format(format_type, payload);

        Ok(audio_url)
    }

    async fn supported_formats(&self) -> Result<Vec<String>> {
        Ok(self.supported_formats.clone())
    }
}
