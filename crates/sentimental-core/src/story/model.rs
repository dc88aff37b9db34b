//! Story domain model.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::format::FormatPayload;
use crate::session::ConversationMessage;

/// A persisted narrative derived from a conversation.
///
/// `created_formats` is a set, and every key of `formats` is in it. The
/// `with_*` helpers return a new value instead of mutating in place, which
/// is how the controller's story cache is updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_name: String,
    pub owner_user_id: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub created_formats: BTreeSet<String>,
    #[serde(default)]
    pub formats: BTreeMap<String, FormatPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Story {
    /// Returns a copy whose `created_formats` covers every generated format.
    pub fn normalized(mut self) -> Self {
        let keys: Vec<String> = self.formats.keys().cloned().collect();
        self.created_formats.extend(keys);
        self
    }

    pub fn format(&self, format_type: &str) -> Option<&FormatPayload> {
        self.formats.get(format_type)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }

    /// Returns a copy with the format stored and marked as created.
    pub fn with_format(&self, format_type: &str, payload: FormatPayload) -> Self {
        let mut next = self.clone();
        next.formats.insert(format_type.to_string(), payload);
        next.created_formats.insert(format_type.to_string());
        next
    }

    /// Returns a copy with the format marked as created.
    pub fn with_created_format(&self, format_type: &str) -> Self {
        let mut next = self.clone();
        next.created_formats.insert(format_type.to_string());
        next
    }

    pub fn with_visibility(&self, is_public: bool) -> Self {
        Self {
            is_public,
            ..self.clone()
        }
    }
}

/// Input for creating a story from a finished conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub content: String,
    pub conversation: Vec<ConversationMessage>,
    pub user_id: String,
    pub author: String,
    pub is_public: bool,
}

/// Identifier returned by the store for a newly created story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedStory {
    pub id: String,
}

/// Owner edit of title and/or content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Result of a visibility change, with the server's confirmation text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityChange {
    pub is_public: bool,
    #[serde(default)]
    pub message: String,
}

/// An audio file to attach to a story format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
