//! Recovery of a `{title, text}` story from free-form model output.
//!
//! The model is asked for JSON but does not always comply. Each tier below
//! is only consulted when every earlier tier failed to match, and the last
//! resort keeps the whole output as the story text so nothing is lost.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title used when the output carries no recognisable title.
pub const PLACEHOLDER_STORY_TITLE: &str = "Untitled Story";

/// A story as produced by the generation service, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDraft {
    pub title: String,
    pub text: String,
}

/// Which tier produced a [`StoryDraft`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTier {
    StrictJson,
    EmbeddedJson,
    LabeledLines,
    RawText,
}

static EMBEDDED_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)\{\s*"title"\s*:\s*"(?:[^"\\]|\\.)*"\s*,\s*"text"\s*:\s*"(?:[^"\\]|\\.)*"\s*\}"#,
    )
    .expect("valid embedded object regex")
});

static TITLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[\s*#]*Title\**:\**\s*(.+?)\s*$").expect("valid title label regex")
});

static TEXT_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ims)^[\s*#]*Text\**:\**\s*(.+)\z").expect("valid text label regex")
});

type Matcher = fn(&str) -> Option<StoryDraft>;

const TIERS: &[(RecoveryTier, Matcher)] = &[
    (RecoveryTier::StrictJson, strict_json),
    (RecoveryTier::EmbeddedJson, embedded_json),
    (RecoveryTier::LabeledLines, labeled_lines),
];

/// Recovers a story draft from raw model output.
pub fn recover_story_draft(raw: &str) -> StoryDraft {
    recover_story_draft_with_tier(raw).0
}

/// Same as [`recover_story_draft`], also reporting which tier matched.
pub fn recover_story_draft_with_tier(raw: &str) -> (StoryDraft, RecoveryTier) {
    TIERS
        .iter()
        .find_map(|(tier, matcher)| matcher(raw).map(|draft| (draft, *tier)))
        .unwrap_or_else(|| {
            (
                StoryDraft {
                    title: PLACEHOLDER_STORY_TITLE.to_string(),
                    text: raw.trim().to_string(),
                },
                RecoveryTier::RawText,
            )
        })
}

fn strict_json(raw: &str) -> Option<StoryDraft> {
    serde_json::from_str::<StoryDraft>(raw.trim())
        .ok()
        .and_then(usable)
}

fn embedded_json(raw: &str) -> Option<StoryDraft> {
    let object = EMBEDDED_OBJECT.find(raw)?;
    serde_json::from_str::<StoryDraft>(object.as_str())
        .ok()
        .and_then(usable)
}

fn labeled_lines(raw: &str) -> Option<StoryDraft> {
    let title = TITLE_LABEL.captures(raw)?[1]
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
        .trim()
        .to_string();
    let text = TEXT_LABEL.captures(raw)?[1].trim().to_string();
    usable(StoryDraft { title, text })
}

fn usable(draft: StoryDraft) -> Option<StoryDraft> {
    let title = draft.title.trim();
    let text = draft.text.trim();
    if text.is_empty() {
        return None;
    }
    Some(StoryDraft {
        title: if title.is_empty() {
            PLACEHOLDER_STORY_TITLE.to_string()
        } else {
            title.to_string()
        },
        text: text.to_string(),
    })
}
