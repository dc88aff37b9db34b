//! RestBackend - `AuthGateway`, `ContentStore` and `GenerationService` over
//! the hosted `/api` routes.
//!
//! Generation runs on the server, which stores derived stories and formats
//! itself. Every owner-only request carries the acting user in
//! `X-User-ID`. Error responses are mapped by status code; the server's
//! `message` (or `error`) text is kept verbatim so the UI can show it as-is.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use sentimental_core::auth::{AuthGateway, AuthUser, Credentials, ProviderIdentity, Registration};
use sentimental_core::generation::{DerivedFormat, DerivedStory, GenerationService, Requester};
use sentimental_core::session::ConversationMessage;
use sentimental_core::story::{
    AudioUpload, ContentStore, CreatedStory, FormatPayload, NewStory, Story, StoryUpdate,
    StructuredFormat, VisibilityChange,
};
use sentimental_core::{Result, SentimentalError};

pub const USER_ID_HEADER: &str = "X-User-ID";

/// HTTP client for the Sentimental backend.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|err| {
            SentimentalError::network(format!("Backend request failed: {err}"))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(map_http_error(status, &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        response.json::<T>().await.map_err(|err| {
            SentimentalError::network(format!("Failed to decode backend response: {err}"))
        })
    }
}

/// Maps a non-success response onto `SentimentalError`.
pub fn map_http_error(status: StatusCode, body: &str) -> SentimentalError {
    let message = serde_json::from_str::<ErrorWire>(body)
        .ok()
        .and_then(|wire| wire.message.or(wire.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                body.to_string()
            }
        });

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            SentimentalError::Validation(message)
        }
        StatusCode::UNAUTHORIZED => SentimentalError::Unauthorized(message),
        StatusCode::FORBIDDEN => SentimentalError::AccessDenied(message),
        StatusCode::NOT_FOUND => SentimentalError::NotFound {
            entity_type: "resource",
            id: message,
        },
        StatusCode::CONFLICT => SentimentalError::Conflict(message),
        _ => SentimentalError::TransientNetwork(format!("{}: {}", status.as_u16(), message)),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct ErrorWire {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterWire<'a> {
    uid: String,
    email: &'a str,
    name: &'a str,
    email_verified: bool,
    provider: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentitySyncWire<'a> {
    uid: &'a str,
    email: &'a str,
    name: String,
    email_verified: bool,
    provider: &'a str,
}

/// Story as the backend serializes it.
#[derive(Deserialize)]
struct StoryWire {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default, alias = "author_name")]
    author: String,
    #[serde(default, alias = "owner_user_id")]
    user_id: String,
    #[serde(default, alias = "is_public")]
    public: bool,
    #[serde(default, alias = "created_formats", rename = "createdFormats")]
    created_formats: BTreeSet<String>,
    #[serde(default)]
    formats: BTreeMap<String, FormatPayload>,
    #[serde(default, alias = "created_at")]
    timestamp: Option<String>,
}

impl From<StoryWire> for Story {
    fn from(wire: StoryWire) -> Self {
        Story {
            id: wire.id,
            title: wire.title,
            content: wire.content,
            author_name: wire.author,
            owner_user_id: wire.user_id,
            is_public: wire.public,
            created_formats: wire.created_formats,
            formats: wire.formats,
            created_at: wire.timestamp,
        }
        .normalized()
    }
}

#[derive(Deserialize)]
struct CreatedWire {
    id: String,
}

#[derive(Serialize)]
struct VisibilityWire {
    is_public: bool,
}

#[derive(Deserialize)]
struct VisibilityResponseWire {
    is_public: bool,
    #[serde(default)]
    message: Option<String>,
}

/// A format as returned by `GET /formats/{format}` and `POST /generate-format`.
///
/// `content` may itself be a string or an object; top-level `title` and
/// `audio_url` are folded in when present.
#[derive(Deserialize)]
struct FormatWire {
    content: FormatPayload,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    audio_url: Option<String>,
}

impl From<FormatWire> for FormatPayload {
    fn from(wire: FormatWire) -> Self {
        let mut payload = wire.content;
        if payload.title().is_none() {
            if let Some(title) = wire.title.filter(|t| !t.trim().is_empty()) {
                payload = FormatPayload::Structured(StructuredFormat {
                    content: payload.content().to_string(),
                    title: Some(title),
                    audio_url: payload.audio_url().map(str::to_string),
                });
            }
        }
        if let Some(audio_url) = wire.audio_url {
            payload = payload.with_audio_url(audio_url);
        }
        payload
    }
}

#[derive(Serialize)]
struct FormatPutWire<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_url: Option<&'a str>,
    user_id: &'a str,
}

#[derive(Deserialize)]
struct UploadWire {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct SupportedFormatsWire {
    #[serde(default)]
    supported_formats: Vec<String>,
}

#[derive(Serialize)]
struct ChatWire<'a> {
    message: &'a str,
    user_id: &'a str,
    conversation_history: &'a [ConversationMessage],
}

#[derive(Deserialize)]
struct ChatReplyWire {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct GenerateStoryWire<'a> {
    conversation: &'a [ConversationMessage],
    user_id: &'a str,
    author: &'a str,
    is_public: bool,
}

#[derive(Deserialize)]
struct StoryRefWire {
    id: String,
}

/// Reply to `POST /stories/generate`; the new id may come in any of
/// these fields, or not at all.
#[derive(Deserialize)]
struct GeneratedStoryWire {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    story_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    story: Option<StoryRefWire>,
    #[serde(default)]
    message: Option<String>,
}

impl GeneratedStoryWire {
    fn story_id(self) -> Option<String> {
        self.story_id
            .or(self.id)
            .or(self.story.map(|story| story.id))
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Serialize)]
struct GenerateFormatWire<'a> {
    format_type: &'a str,
    user_id: &'a str,
}

// ============================================================================
// AuthGateway
// ============================================================================

#[async_trait]
impl AuthGateway for RestBackend {
    async fn register(&self, registration: Registration) -> Result<AuthUser> {
        let body = RegisterWire {
            uid: format!("temp_{}", chrono::Utc::now().timestamp_millis()),
            email: &registration.email,
            name: &registration.name,
            email_verified: false,
            provider: "email",
            password: registration.password.as_deref(),
        };
        self.fetch(self.client.post(self.url("/api/auth/register")).json(&body))
            .await
    }

    async fn login(&self, credentials: Credentials) -> Result<AuthUser> {
        self.fetch(
            self.client
                .post(self.url("/api/auth/login"))
                .json(&credentials),
        )
        .await
    }

    async fn sync_identity(&self, identity: ProviderIdentity) -> Result<AuthUser> {
        let body = IdentitySyncWire {
            uid: &identity.uid,
            email: &identity.email,
            name: identity.resolved_name(),
            email_verified: identity.email_verified,
            provider: &identity.provider,
        };
        self.fetch(
            self.client
                .post(self.url("/api/auth/firebase-sync"))
                .json(&body),
        )
        .await
    }
}

// ============================================================================
// ContentStore
// ============================================================================

#[async_trait]
impl ContentStore for RestBackend {
    async fn list_public_stories(&self) -> Result<Vec<Story>> {
        let stories: Vec<StoryWire> = self.fetch(self.client.get(self.url("/api/stories"))).await?;
        Ok(stories
            .into_iter()
            .map(Story::from)
            .filter(|story| story.is_public)
            .collect())
    }

    /// The backend has no per-user listing; the full list is filtered here.
    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>> {
        let stories: Vec<StoryWire> = self
            .fetch(
                self.client
                    .get(self.url("/api/stories"))
                    .header(USER_ID_HEADER, user_id),
            )
            .await?;
        Ok(stories
            .into_iter()
            .map(Story::from)
            .filter(|story| story.is_owned_by(user_id))
            .collect())
    }

    async fn create_story(&self, story: NewStory) -> Result<CreatedStory> {
        let created: CreatedWire = self
            .fetch(
                self.client
                    .post(self.url("/api/stories"))
                    .header(USER_ID_HEADER, story.user_id.as_str())
                    .json(&story),
            )
            .await?;
        Ok(CreatedStory { id: created.id })
    }

    async fn update_story(
        &self,
        story_id: &str,
        update: StoryUpdate,
        actor: &str,
    ) -> Result<Story> {
        let story: StoryWire = self
            .fetch(
                self.client
                    .put(self.url(&format!("/api/stories/{story_id}")))
                    .header(USER_ID_HEADER, actor)
                    .json(&update),
            )
            .await?;
        Ok(story.into())
    }

    async fn set_story_visibility(
        &self,
        story_id: &str,
        is_public: bool,
        actor: &str,
    ) -> Result<VisibilityChange> {
        let response: VisibilityResponseWire = self
            .fetch(
                self.client
                    .put(self.url(&format!("/api/stories/{story_id}/privacy")))
                    .header(USER_ID_HEADER, actor)
                    .json(&VisibilityWire { is_public }),
            )
            .await?;

        let message = response.message.unwrap_or_else(|| {
            format!(
                "Story is now {}",
                if response.is_public { "public" } else { "private" }
            )
        });
        Ok(VisibilityChange {
            is_public: response.is_public,
            message,
        })
    }

    async fn get_format(&self, story_id: &str, format_type: &str) -> Result<FormatPayload> {
        let wire: FormatWire = self
            .fetch(
                self.client
                    .get(self.url(&format!("/api/stories/{story_id}/formats/{format_type}"))),
            )
            .await
            .map_err(|err| match err {
                SentimentalError::NotFound { .. } => {
                    SentimentalError::not_found("format", format_type)
                }
                other => other,
            })?;
        Ok(wire.into())
    }

    async fn put_format(
        &self,
        story_id: &str,
        format_type: &str,
        payload: FormatPayload,
        actor: &str,
    ) -> Result<()> {
        let body = FormatPutWire {
            content: payload.content(),
            title: payload.title(),
            audio_url: payload.audio_url(),
            user_id: actor,
        };
        self.execute(
            self.client
                .put(self.url(&format!("/api/stories/{story_id}/formats/{format_type}")))
                .header(USER_ID_HEADER, actor)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn upload_audio(
        &self,
        upload: AudioUpload,
        story_id: &str,
        format_type: &str,
        actor: &str,
    ) -> Result<String> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|err| SentimentalError::validation(format!("Invalid content type: {err}")))?;
        let form = Form::new()
            .part("file", part)
            .text("story_id", story_id.to_string())
            .text("format_type", format_type.to_string());

        let result: UploadWire = self
            .fetch(
                self.client
                    .post(self.url("/api/upload/audio"))
                    .header(USER_ID_HEADER, actor)
                    .multipart(form),
            )
            .await?;

        match result.audio_url {
            Some(url) if result.success => Ok(url),
            _ => Err(SentimentalError::validation(
                result.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    async fn supported_formats(&self) -> Result<Vec<String>> {
        let wire: SupportedFormatsWire = self
            .fetch(self.client.get(self.url("/api/formats/supported")))
            .await?;
        Ok(wire.supported_formats)
    }
}

// ============================================================================
// GenerationService
// ============================================================================

#[async_trait]
impl GenerationService for RestBackend {
    /// The last turn goes out as `message`, everything before it as history.
    async fn chat(
        &self,
        messages: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<String> {
        let Some((last, history)) = messages.split_last() else {
            return Err(SentimentalError::validation("Message cannot be empty"));
        };
        let body = ChatWire {
            message: &last.content,
            user_id: requester.user_id,
            conversation_history: history,
        };

        let reply: ChatReplyWire = self
            .fetch(
                self.client
                    .post(self.url("/api/chat/message"))
                    .header(USER_ID_HEADER, requester.user_id)
                    .json(&body),
            )
            .await?;

        match reply.response.filter(|r| !r.trim().is_empty()) {
            Some(response) if reply.success => Ok(response),
            _ => Err(SentimentalError::generation(
                reply.message.unwrap_or_else(|| "Chat failed".to_string()),
            )),
        }
    }

    async fn derive_story(
        &self,
        conversation: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<DerivedStory> {
        let body = GenerateStoryWire {
            conversation,
            user_id: requester.user_id,
            author: requester.author,
            is_public: false,
        };

        let generated: GeneratedStoryWire = self
            .fetch(
                self.client
                    .post(self.url("/api/stories/generate"))
                    .header(USER_ID_HEADER, requester.user_id)
                    .json(&body),
            )
            .await?;

        if !generated.success {
            return Err(SentimentalError::generation(
                generated
                    .message
                    .unwrap_or_else(|| "Failed to create story".to_string()),
            ));
        }
        Ok(DerivedStory::Stored {
            id: generated.story_id(),
        })
    }

    async fn derive_format(
        &self,
        story: &Story,
        format_type: &str,
        requester: Requester<'_>,
    ) -> Result<DerivedFormat> {
        let wire: FormatWire = self
            .fetch(
                self.client
                    .post(self.url(&format!("/api/stories/{}/generate-format", story.id)))
                    .header(USER_ID_HEADER, requester.user_id)
                    .json(&GenerateFormatWire {
                        format_type,
                        user_id: requester.user_id,
                    }),
            )
            .await?;
        Ok(DerivedFormat::stored(wire.into()))
    }
}
