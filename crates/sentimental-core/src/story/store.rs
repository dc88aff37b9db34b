//! Content store trait.
//!
//! Durable storage of stories and their generated formats.

use async_trait::async_trait;

use super::format::FormatPayload;
use super::model::{AudioUpload, CreatedStory, NewStory, Story, StoryUpdate, VisibilityChange};
use crate::error::Result;

/// An abstract store for stories and per-story formats.
///
/// Owner-only operations take the acting user id as `actor`; the store is
/// expected to reject a non-owner with `SentimentalError::AccessDenied`.
/// Missing stories or formats are reported as `SentimentalError::NotFound`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Lists stories visible to everyone.
    async fn list_public_stories(&self) -> Result<Vec<Story>>;

    /// Lists every story owned by `user_id`, private ones included.
    async fn list_user_stories(&self, user_id: &str) -> Result<Vec<Story>>;

    /// Persists a new story.
    async fn create_story(&self, story: NewStory) -> Result<CreatedStory>;

    /// Applies an owner edit and returns the updated story.
    async fn update_story(&self, story_id: &str, update: StoryUpdate, actor: &str)
    -> Result<Story>;

    /// Sets the story's visibility.
    async fn set_story_visibility(
        &self,
        story_id: &str,
        is_public: bool,
        actor: &str,
    ) -> Result<VisibilityChange>;

    /// Fetches a previously generated format.
    async fn get_format(&self, story_id: &str, format_type: &str) -> Result<FormatPayload>;

    /// Stores (or replaces) a generated format.
    async fn put_format(
        &self,
        story_id: &str,
        format_type: &str,
        payload: FormatPayload,
        actor: &str,
    ) -> Result<()>;

    /// Uploads an audio rendition and returns its public url.
    async fn upload_audio(
        &self,
        upload: AudioUpload,
        story_id: &str,
        format_type: &str,
        actor: &str,
    ) -> Result<String>;

    /// Format keys the backend can generate.
    async fn supported_formats(&self) -> Result<Vec<String>>;
}
