//! Renderable state owned by the controller.

use serde::Serialize;

use sentimental_core::ErrorKind;
use sentimental_core::View;
use sentimental_core::session::{ConversationMessage, Session};
use sentimental_core::story::Story;

/// The format currently open in `format-detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFormat {
    pub story_id: String,
    pub format_type: String,
    /// Display title; filled once content is known.
    pub title: Option<String>,
    pub audio_url: Option<String>,
}

impl SelectedFormat {
    pub fn new(story_id: impl Into<String>, format_type: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            format_type: format_type.into(),
            title: None,
            audio_url: None,
        }
    }

    pub fn is(&self, story_id: &str, format_type: &str) -> bool {
        self.story_id == story_id && self.format_type == format_type
    }
}

/// What is on screen.
///
/// `selected_story` is only meaningful in `story-detail`/`format-detail`,
/// `selected_format` and `format_content` only in `format-detail`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub current_view: View,
    /// Last top-level tab the user left; target of `back` from a story.
    pub previous_view: Option<View>,
    pub selected_story: Option<Story>,
    pub selected_format: Option<SelectedFormat>,
    pub format_content: Option<String>,
}

impl ViewState {
    pub(crate) fn clear_selection(&mut self) {
        self.selected_story = None;
        self.clear_format();
    }

    pub(crate) fn clear_format(&mut self) {
        self.selected_format = None;
        self.format_content = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeKind {
    Error(ErrorKind),
    Info,
}

/// The single user-facing message slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error(kind),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, NoticeKind::Error(_))
    }
}

/// Everything a front end needs to render one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerState {
    pub view: ViewState,
    pub session: Option<Session>,
    pub conversation: Vec<ConversationMessage>,
    pub public_stories: Vec<Story>,
    pub user_stories: Vec<Story>,
    pub supported_formats: Vec<String>,
    pub notice: Option<Notice>,
    pub login_prompt: bool,
}

impl ControllerState {
    /// The signed-in session, if its id is usable.
    pub fn valid_session(&self) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_valid())
    }

    /// Latest cached copy of a story, user list first.
    pub fn find_story(&self, story_id: &str) -> Option<&Story> {
        self.user_stories
            .iter()
            .chain(self.public_stories.iter())
            .find(|s| s.id == story_id)
    }

    /// Replaces every cached copy of `story` (lists and selection).
    pub(crate) fn replace_story(&mut self, story: &Story) {
        for cached in self
            .user_stories
            .iter_mut()
            .chain(self.public_stories.iter_mut())
            .filter(|s| s.id == story.id)
        {
            *cached = story.clone();
        }
        if let Some(selected) = self
            .view
            .selected_story
            .as_mut()
            .filter(|s| s.id == story.id)
        {
            *selected = story.clone();
        }
    }
}
