//! Display title extraction for generated formats.
//!
//! Songs come back from the model with the title buried somewhere in the
//! lyrics. The rules below are tried in order and the first hit wins, so a
//! precise marker always beats a cruder guess further down the list.

use once_cell::sync::Lazy;
use regex::Regex;

use super::format::{SONG, display_name};

/// Returned when nothing in the lyrics looks like a title.
pub const FALLBACK_SONG_TITLE: &str = "Generated Song";

const MAX_TITLE_LINE_CHARS: usize = 60;

const LYRIC_OPENERS: &[&str] = &[
    "walking", "got this", "man i", "verse", "chorus", "bridge", "♪", "i was", "there was",
    "in the",
];

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "they", "them", "were", "have", "been", "will", "would",
    "could", "should",
];

static QUOTED_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)TITLE:\s*['"]([^'"]+)['"]"#).expect("valid quoted title regex")
});

static BARE_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)TITLE:\s*([^\n]+)").expect("valid bare title regex"));

static SONG_ABOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:song about|a song about)\s+([^\n.]{10,50})").expect("valid about regex")
});

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid non-word regex"));

type TitleRule = fn(&str) -> Option<String>;

const SONG_RULES: &[(&str, TitleRule)] = &[
    ("quoted_marker", quoted_marker),
    ("bare_marker", bare_marker),
    ("short_first_line", short_first_line),
    ("song_about", song_about),
    ("meaningful_words", meaningful_words),
];

/// Picks the title to show for a generated format.
///
/// For songs this runs the heuristic chain and never returns an empty
/// string. Other formats are titled by their display name.
pub fn extract_display_title(format_type: &str, raw_content: &str) -> String {
    if format_type == SONG {
        extract_song_title(raw_content)
    } else {
        display_name(format_type)
    }
}

/// Runs the song title rules in order.
pub fn extract_song_title(content: &str) -> String {
    SONG_RULES
        .iter()
        .find_map(|(_, rule)| rule(content).filter(|title| !title.trim().is_empty()))
        .unwrap_or_else(|| FALLBACK_SONG_TITLE.to_string())
}

fn quoted_marker(content: &str) -> Option<String> {
    QUOTED_TITLE
        .captures(content)
        .map(|caps| caps[1].to_string())
}

fn bare_marker(content: &str) -> Option<String> {
    BARE_TITLE
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
}

fn short_first_line(content: &str) -> Option<String> {
    let first_line = content.lines().map(str::trim).find(|line| !line.is_empty())?;
    let lowered = first_line.to_lowercase();

    if LYRIC_OPENERS.iter().any(|opener| lowered.starts_with(opener)) {
        return None;
    }
    if first_line.chars().count() >= MAX_TITLE_LINE_CHARS
        || first_line.contains(',')
        || first_line.contains('.')
    {
        return None;
    }

    Some(first_line.to_string())
}

fn song_about(content: &str) -> Option<String> {
    SONG_ABOUT
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
}

fn meaningful_words(content: &str) -> Option<String> {
    let cleaned = NON_WORD.replace_all(content, " ");
    let words: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() > 3)
        .filter(|word| !STOP_WORDS.contains(&word.to_lowercase().as_str()))
        .take(3)
        .collect();

    (words.len() >= 2).then(|| words.join(" "))
}
