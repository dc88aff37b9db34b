//! Story domain module.
//!
//! # Module Structure
//!
//! - `model`: `Story` and the request/response values around it
//! - `format`: `FormatPayload` and the format catalog
//! - `title`: display-title heuristics for generated formats
//! - `parse`: recovery of `{title, text}` from model output
//! - `store`: `ContentStore` trait

mod format;
mod model;
mod parse;
mod store;
mod title;

pub use format::{
    FALLBACK_SUPPORTED_FORMATS, FormatPayload, SONG, StructuredFormat, display_name,
    known_formats,
};
pub use model::{AudioUpload, CreatedStory, NewStory, Story, StoryUpdate, VisibilityChange};
pub use parse::{
    PLACEHOLDER_STORY_TITLE, RecoveryTier, StoryDraft, recover_story_draft,
    recover_story_draft_with_tier,
};
pub use store::ContentStore;
pub use title::{FALLBACK_SONG_TITLE, extract_display_title, extract_song_title};
