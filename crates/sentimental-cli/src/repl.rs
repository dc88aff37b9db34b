//! Interactive loop driving the controller.

use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use sentimental_application::ViewStateController;
use sentimental_core::View;
use sentimental_core::auth::ProviderIdentity;
use sentimental_core::story::AudioUpload;

use crate::command::{self, COMMANDS, Command, HELP};
use crate::render;

/// Completion, highlighting and hints for slash commands.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(controller: &ViewStateController) -> Result<()> {
    let mut rl = Editor::new()?;
    rl.set_helper(Some(CliHelper::new()));

    println!("{}", "=== Sentimental ===".bright_magenta().bold());
    println!(
        "{}",
        "Type /help for commands, or 'quit' to exit.".bright_black()
    );
    println!();

    controller.initialize().await;
    show(controller).await;

    loop {
        let prompt = format!("{}> ", controller.current_view().await);
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(trimmed);

                let command = match command::parse(trimmed) {
                    Ok(command) => command,
                    Err(usage) => {
                        println!("{}", usage.yellow());
                        continue;
                    }
                };
                if let Flow::Quit = dispatch(controller, command).await {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    Ok(())
}

/// Runs one command, then prints the view (when it changed) and any
/// pending notice. Controller errors arrive through the notice slot.
async fn dispatch(controller: &ViewStateController, command: Command) -> Flow {
    let redraw = match command {
        Command::Quit => return Flow::Quit,
        Command::Help => {
            println!("{}", HELP.bright_black());
            false
        }
        Command::Say(text) => {
            if controller.current_view().await != View::Share {
                controller.navigate(View::Share).await;
            }
            if let Ok(reply) = controller.send_message(&text).await {
                for line in reply.lines() {
                    println!("{}", line.bright_blue());
                }
            }
            false
        }
        Command::Navigate(view) => {
            controller.navigate(view).await;
            true
        }
        Command::Back => {
            controller.back().await;
            true
        }
        Command::Register {
            email,
            name,
            password,
        } => controller
            .register(&email, &name, password.as_deref())
            .await
            .is_ok(),
        Command::Login { email, password } => controller
            .login(&email, password.as_deref())
            .await
            .is_ok(),
        Command::ProviderSignIn { uid, email, name } => {
            let identity = ProviderIdentity {
                uid,
                email,
                display_name: name,
                email_verified: true,
                photo_url: None,
                provider: "google".to_string(),
            };
            controller.sync_identity(identity).await.is_ok()
        }
        Command::Logout => {
            controller.logout().await;
            true
        }
        Command::Derive => matches!(
            controller.derive_story_from_conversation().await,
            Ok(Some(_))
        ),
        Command::List => true,
        Command::Refresh => controller.refresh_stories().await.is_ok(),
        Command::Open(reference) => open(controller, &reference).await,
        Command::Format(format_type) => {
            let story = controller.snapshot().await.view.selected_story;
            match story {
                Some(story) => {
                    // Failures still leave format-detail with a message to show.
                    let _ = controller.view_format(&story, &format_type).await;
                    true
                }
                None => {
                    println!("{}", "Open a story first (/open <number>).".yellow());
                    false
                }
            }
        }
        Command::Formats => {
            render::formats(&controller.snapshot().await);
            false
        }
        Command::TogglePrivacy => match selected_story(controller).await {
            Some((id, is_public)) => controller
                .toggle_story_privacy(&id, is_public)
                .await
                .is_ok(),
            None => false,
        },
        Command::EditStory { title, content } => match selected_story(controller).await {
            Some((id, _)) => controller
                .update_story(&id, &title, &content)
                .await
                .is_ok(),
            None => false,
        },
        Command::EditFormat(content) => match selected_format(controller).await {
            Some((story_id, format_type)) => controller
                .update_format(&story_id, &format_type, &content)
                .await
                .is_ok(),
            None => false,
        },
        Command::Upload(path) => match selected_format(controller).await {
            Some((story_id, format_type)) => match read_upload(&path).await {
                Ok(upload) => controller
                    .upload_audio(&story_id, &format_type, upload)
                    .await
                    .is_ok(),
                Err(e) => {
                    eprintln!("{}", format!("Cannot read {}: {}", path.display(), e).red());
                    false
                }
            },
            None => false,
        },
        Command::State => {
            render::state_dump(&controller.snapshot().await);
            false
        }
        Command::Dismiss => {
            controller.dismiss_notice().await;
            controller.dismiss_login_prompt().await;
            false
        }
    };

    let state = controller.snapshot().await;
    if redraw {
        render::view(&state);
    }
    if let Some(notice) = &state.notice {
        render::notice(notice);
        controller.dismiss_notice().await;
    }
    if state.login_prompt {
        render::login_prompt();
        controller.dismiss_login_prompt().await;
    }
    Flow::Continue
}

async fn show(controller: &ViewStateController) {
    let state = controller.snapshot().await;
    render::view(&state);
    if let Some(notice) = &state.notice {
        render::notice(notice);
        controller.dismiss_notice().await;
    }
}

async fn open(controller: &ViewStateController, reference: &str) -> bool {
    let state = controller.snapshot().await;
    let listed = render::listed_stories(&state);
    let story = reference
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| listed.get(i))
        .or_else(|| state.find_story(reference));

    match story {
        Some(story) => {
            controller.open_story(story).await;
            true
        }
        None => {
            println!("{}", format!("No story '{reference}' in this list.").yellow());
            false
        }
    }
}

/// Id and visibility of the open story.
async fn selected_story(controller: &ViewStateController) -> Option<(String, bool)> {
    let state = controller.snapshot().await;
    let selected = state
        .view
        .selected_story
        .as_ref()
        .map(|s| (s.id.clone(), s.is_public));
    if selected.is_none() {
        println!("{}", "Open a story first (/open <number>).".yellow());
    }
    selected
}

async fn selected_format(controller: &ViewStateController) -> Option<(String, String)> {
    let state = controller.snapshot().await;
    let selected = state
        .view
        .selected_format
        .as_ref()
        .map(|f| (f.story_id.clone(), f.format_type.clone()));
    if selected.is_none() {
        println!("{}", "Open a format first (/format <type>).".yellow());
    }
    selected
}

async fn read_upload(path: &std::path::Path) -> std::io::Result<AudioUpload> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(AudioUpload {
        file_name,
        content_type,
        bytes,
    })
}
