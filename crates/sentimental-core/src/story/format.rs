//! Story formats: payload shape and the format catalog.

use serde::{Deserialize, Serialize};

/// Key of the song format, which carries its own title.
pub const SONG: &str = "song";

/// Known format keys with their display names.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("x", "X"),
    ("linkedin", "Linkedin"),
    ("instagram", "Instagram"),
    ("facebook", "Facebook"),
    ("poem", "Poem"),
    ("song", "Song"),
    ("reel", "Reel"),
    ("fairytale", "Fairytale"),
    ("article", "Article"),
    ("blog_post", "Blog Post"),
    ("presentation", "Presentation"),
    ("newsletter", "Newsletter"),
    ("podcast", "Podcast"),
    ("insights", "Therapeutic Feedback"),
    ("growth_summary", "Growth Summary"),
    ("journal_entry", "Journal Entry"),
];

/// Formats offered when the content store cannot report its own list.
pub const FALLBACK_SUPPORTED_FORMATS: &[&str] =
    &["x", "linkedin", "instagram", "poem", "song", "article", "insights"];

/// Returns every format key the catalog knows about.
pub fn known_formats() -> impl Iterator<Item = &'static str> {
    DISPLAY_NAMES.iter().map(|(key, _)| *key)
}

/// Human readable name for a format key.
///
/// Unknown keys are shown with underscores as spaces and each word
/// capitalised, e.g. `tiktok_script` → `Tiktok Script`.
pub fn display_name(format_type: &str) -> String {
    if let Some((_, name)) = DISPLAY_NAMES.iter().find(|(key, _)| *key == format_type) {
        return (*name).to_string();
    }

    format_type
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Structured payload for formats that carry more than text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredFormat {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

/// Generated content for one format of a story.
///
/// Collaborators answer either with a bare string or with an object; the
/// distinction is resolved once, here, when the response is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatPayload {
    PlainText(String),
    Structured(StructuredFormat),
}

impl FormatPayload {
    pub fn text(content: impl Into<String>) -> Self {
        FormatPayload::PlainText(content.into())
    }

    pub fn titled(content: impl Into<String>, title: impl Into<String>) -> Self {
        FormatPayload::Structured(StructuredFormat {
            content: content.into(),
            title: Some(title.into()),
            audio_url: None,
        })
    }

    pub fn content(&self) -> &str {
        match self {
            FormatPayload::PlainText(text) => text,
            FormatPayload::Structured(s) => &s.content,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            FormatPayload::PlainText(_) => None,
            FormatPayload::Structured(s) => s.title.as_deref().filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn audio_url(&self) -> Option<&str> {
        match self {
            FormatPayload::PlainText(_) => None,
            FormatPayload::Structured(s) => s.audio_url.as_deref(),
        }
    }

    /// Returns a copy with the audio url attached, promoting plain text.
    pub fn with_audio_url(&self, audio_url: impl Into<String>) -> Self {
        let mut structured = self.clone().into_structured();
        structured.audio_url = Some(audio_url.into());
        FormatPayload::Structured(structured)
    }

    /// Returns a copy with new content, keeping title and audio.
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        match self {
            FormatPayload::PlainText(_) => FormatPayload::PlainText(content.into()),
            FormatPayload::Structured(s) => FormatPayload::Structured(StructuredFormat {
                content: content.into(),
                title: s.title.clone(),
                audio_url: s.audio_url.clone(),
            }),
        }
    }

    fn into_structured(self) -> StructuredFormat {
        match self {
            FormatPayload::PlainText(content) => StructuredFormat {
                content,
                title: None,
                audio_url: None,
            },
            FormatPayload::Structured(s) => s,
        }
    }
}

impl From<String> for FormatPayload {
    fn from(value: String) -> Self {
        FormatPayload::PlainText(value)
    }
}
