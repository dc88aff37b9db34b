//! Instruction texts sent with generation requests.
//!
//! Deliberately short. The model's output is recovered heuristically on
//! the way back (see `sentimental_core::story::recover_story_draft`), so the
//! prompts only have to point it in the right direction.

use sentimental_core::session::{ConversationMessage, MessageRole};
use sentimental_core::story::{SONG, display_name};

pub const STORY_SYSTEM_PROMPT: &str = "Turn the user's reflection conversation into a short \
first-person story. Reply with JSON only: {\"title\": \"...\", \"text\": \"...\"}.";

/// System prompt for rewriting a story into `format_type`.
pub fn format_system_prompt(format_type: &str) -> String {
    let instruction = match format_type {
        "x" => "a post for X of at most 280 characters",
        "linkedin" => "a professional LinkedIn post",
        "instagram" => "an Instagram caption with a few hashtags",
        "facebook" => "a warm Facebook post",
        "poem" => "a free-verse poem",
        SONG => "song lyrics with verses and a chorus. Start with a line of the form TITLE: \"<song title>\"",
        "reel" => "a short video reel script",
        "fairytale" => "a fairytale",
        "article" => "a short article",
        "blog_post" => "a blog post",
        "presentation" => "presentation slide notes",
        "newsletter" => "a newsletter section",
        "podcast" => "a podcast episode outline",
        "insights" => "gentle therapeutic feedback on the themes and emotions in the story",
        "growth_summary" => "a summary of the personal growth the story shows",
        "journal_entry" => "a private journal entry",
        _ => "",
    };

    if instruction.is_empty() {
        format!(
            "Rewrite the user's story as {}. Reply with the content only.",
            display_name(format_type)
        )
    } else {
        format!("Rewrite the user's story as {instruction}. Reply with the content only.")
    }
}

/// Renders a transcript as `Speaker: text` lines, skipping system turns.
pub fn render_transcript(conversation: &[ConversationMessage]) -> String {
    conversation
        .iter()
        .filter_map(|message| match message.role {
            MessageRole::User => Some(format!("User: {}", message.content)),
            MessageRole::Assistant => Some(format!("Guide: {}", message.content)),
            MessageRole::System => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
