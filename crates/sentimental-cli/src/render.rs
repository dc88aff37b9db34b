//! Terminal rendering of controller state.

use colored::Colorize;

use sentimental_application::{ControllerState, Notice, NoticeKind};
use sentimental_core::View;
use sentimental_core::session::MessageRole;
use sentimental_core::story::{Story, display_name};

pub fn notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Error(kind) => {
            eprintln!("{}", format!("[{}] {}", kind, notice.message).red());
        }
        NoticeKind::Info => println!("{}", notice.message.bright_green()),
    }
}

pub fn login_prompt() {
    println!(
        "{}",
        "Sign in with /login <email> or /register <email> <name> to continue.".yellow()
    );
}

/// The stories listed on the current tab: own stories on `stories`,
/// public ones everywhere else.
pub fn listed_stories(state: &ControllerState) -> &[Story] {
    match state.view.current_view {
        View::Stories => &state.user_stories,
        _ => &state.public_stories,
    }
}

pub fn header(state: &ControllerState) {
    let who = state
        .valid_session()
        .map(|s| format!("{} <{}>", s.display_name, s.email))
        .unwrap_or_else(|| "not signed in".to_string());
    println!(
        "{} {}",
        format!("[{}]", state.view.current_view).bright_magenta().bold(),
        who.bright_black()
    );
}

pub fn view(state: &ControllerState) {
    header(state);
    match state.view.current_view {
        View::Discover | View::Stories => stories(state),
        View::Share => conversation(state),
        View::StoryDetail => {
            if let Some(story) = &state.view.selected_story {
                story_detail(story);
            }
        }
        View::FormatDetail => format_detail(state),
        View::InnerSpace => {
            println!("{}", "A quiet place. Nothing to do here but breathe.".bright_black())
        }
    }
}

fn stories(state: &ControllerState) {
    let listed = listed_stories(state);
    if listed.is_empty() {
        println!("{}", "No stories yet.".bright_black());
        return;
    }
    for (i, story) in listed.iter().enumerate() {
        let visibility = if story.is_public { "public" } else { "private" };
        println!(
            "{:>3}. {} {} {}",
            i + 1,
            story.title.bold(),
            format!("by {}", story.author_name).bright_black(),
            format!("({visibility})").bright_black()
        );
    }
}

fn conversation(state: &ControllerState) {
    if state.conversation.is_empty() {
        println!(
            "{}",
            "What's on your mind? Type to talk, /derive when you're ready.".bright_black()
        );
    }
    for message in &state.conversation {
        match message.role {
            MessageRole::User => println!("{}", format!("> {}", message.content).green()),
            MessageRole::Assistant => {
                for line in message.content.lines() {
                    println!("{}", line.bright_blue());
                }
            }
            MessageRole::System => {}
        }
    }
}

fn story_detail(story: &Story) {
    println!("{}", story.title.bold().underline());
    println!("{}", format!("by {} ({})", story.author_name, story.id).bright_black());
    println!();
    println!("{}", story.content);
    if !story.created_formats.is_empty() {
        println!();
        let formats: Vec<&str> = story.created_formats.iter().map(String::as_str).collect();
        println!("{} {}", "Formats:".bright_black(), formats.join(", "));
    }
}

fn format_detail(state: &ControllerState) {
    let Some(selected) = &state.view.selected_format else {
        return;
    };
    let title = selected
        .title
        .clone()
        .unwrap_or_else(|| display_name(&selected.format_type));
    println!(
        "{} {}",
        title.bold().underline(),
        format!("[{}]", display_name(&selected.format_type)).bright_black()
    );
    match &state.view.format_content {
        Some(content) => println!("{content}"),
        None => println!("{}", "Loading...".bright_black()),
    }
    if let Some(url) = &selected.audio_url {
        println!("{} {}", "Audio:".bright_black(), url.cyan());
    }
}

pub fn formats(state: &ControllerState) {
    for format in &state.supported_formats {
        println!("  {} {}", format.cyan(), display_name(format).bright_black());
    }
}

pub fn state_dump(state: &ControllerState) {
    let view = &state.view;
    println!("current:  {}", view.current_view);
    println!(
        "previous: {}",
        view.previous_view
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into())
    );
    println!(
        "story:    {}",
        view.selected_story
            .as_ref()
            .map(|s| s.id.as_str())
            .unwrap_or("-")
    );
    println!(
        "format:   {}",
        view.selected_format
            .as_ref()
            .map(|f| f.format_type.as_str())
            .unwrap_or("-")
    );
    println!("turns:    {}", state.conversation.len());
}
