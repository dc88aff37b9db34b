//! Screen identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every screen the application can show.
///
/// `Discover`, `Share`, `Stories` and `InnerSpace` are top-level tabs;
/// `StoryDetail` and `FormatDetail` are drill-downs below them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    #[default]
    Discover,
    /// The chat screen.
    Share,
    Stories,
    StoryDetail,
    FormatDetail,
    InnerSpace,
}

impl View {
    pub const ALL: [View; 6] = [
        View::Discover,
        View::Share,
        View::Stories,
        View::StoryDetail,
        View::FormatDetail,
        View::InnerSpace,
    ];

    /// Parses a view id; anything unknown lands on `Discover`.
    pub fn parse(id: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|view| view.as_str() == id.trim())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Discover => "discover",
            View::Share => "share",
            View::Stories => "stories",
            View::StoryDetail => "story-detail",
            View::FormatDetail => "format-detail",
            View::InnerSpace => "inner-space",
        }
    }

    pub fn is_tab(&self) -> bool {
        matches!(
            self,
            View::Discover | View::Share | View::Stories | View::InnerSpace
        )
    }

    /// Tabs a story can be opened from, and so the only ones `back`
    /// returns to from `StoryDetail`.
    pub fn lists_stories(&self) -> bool {
        matches!(self, View::Discover | View::Stories)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
