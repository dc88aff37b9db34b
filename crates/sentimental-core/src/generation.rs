//! Generation service trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::session::{ConversationMessage, MessageRole, Session};
use crate::story::{FormatPayload, Story, StoryDraft};

/// Persona injected when a transcript carries no system message.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a thoughtful reflection guide, helping users \
explore their thoughts and feelings. Be empathetic, curious, and supportive. Ask thoughtful \
questions to help users gain deeper insights. Keep your responses relatively brief (2-3 \
paragraphs max) and always end with a gentle question to encourage further reflection.";

/// The signed-in user a generation runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester<'a> {
    pub user_id: &'a str,
    pub author: &'a str,
}

impl<'a> From<&'a Session> for Requester<'a> {
    fn from(session: &'a Session) -> Self {
        Self {
            user_id: &session.id,
            author: &session.display_name,
        }
    }
}

/// Outcome of deriving a story from a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedStory {
    /// Generated text the caller still has to store.
    Draft(StoryDraft),
    /// Already stored by the service, under `id` when it reported one.
    Stored { id: Option<String> },
}

/// Outcome of deriving a format from a story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedFormat {
    pub payload: FormatPayload,
    /// True when the service already saved the payload on the story.
    pub stored: bool,
}

impl DerivedFormat {
    pub fn unsaved(payload: FormatPayload) -> Self {
        Self {
            payload,
            stored: false,
        }
    }

    pub fn stored(payload: FormatPayload) -> Self {
        Self {
            payload,
            stored: true,
        }
    }
}

/// Turns conversations into replies and stories, and stories into formats.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces the next assistant turn for a role-tagged transcript.
    async fn chat(
        &self,
        messages: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<String>;

    /// Derives a story from a conversation.
    async fn derive_story(
        &self,
        conversation: &[ConversationMessage],
        requester: Requester<'_>,
    ) -> Result<DerivedStory>;

    /// Rewrites a story into the requested format.
    async fn derive_format(
        &self,
        story: &Story,
        format_type: &str,
        requester: Requester<'_>,
    ) -> Result<DerivedFormat>;
}

/// Prepends `system_prompt` unless the transcript already has a system turn.
pub fn with_system_prompt(
    messages: &[ConversationMessage],
    system_prompt: &str,
) -> Vec<ConversationMessage> {
    let mut out = Vec::with_capacity(messages.len() + 1);
    if !messages.iter().any(|m| m.role == MessageRole::System) {
        out.push(ConversationMessage::system(system_prompt));
    }
    out.extend_from_slice(messages);
    out
}
