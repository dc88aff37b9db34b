//! REPL input parsing.

use std::path::PathBuf;

use sentimental_core::View;

/// Slash commands offered for completion and hints.
pub const COMMANDS: &[&str] = &[
    "/back",
    "/derive",
    "/discover",
    "/dismiss",
    "/edit",
    "/edit-format",
    "/format",
    "/formats",
    "/go",
    "/google",
    "/help",
    "/inner-space",
    "/list",
    "/login",
    "/logout",
    "/open",
    "/privacy",
    "/refresh",
    "/register",
    "/share",
    "/state",
    "/stories",
    "/upload",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: a chat turn.
    Say(String),
    Navigate(View),
    Back,
    Register {
        email: String,
        name: String,
        password: Option<String>,
    },
    Login {
        email: String,
        password: Option<String>,
    },
    ProviderSignIn {
        uid: String,
        email: String,
        name: Option<String>,
    },
    Logout,
    Derive,
    List,
    Refresh,
    /// Story by 1-based position in the listed tab, or by id.
    Open(String),
    Format(String),
    Formats,
    TogglePrivacy,
    EditStory { title: String, content: String },
    EditFormat(String),
    Upload(PathBuf),
    State,
    Dismiss,
    Help,
    Quit,
}

/// Parses one REPL line. Errors are usage messages.
pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line == "quit" || line == "exit" {
        return Ok(Command::Quit);
    }
    if !line.starts_with('/') {
        return Ok(Command::Say(line.to_string()));
    }

    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match name {
        "/discover" => Command::Navigate(View::Discover),
        "/share" => Command::Navigate(View::Share),
        "/stories" => Command::Navigate(View::Stories),
        "/inner-space" => Command::Navigate(View::InnerSpace),
        "/go" => Command::Navigate(View::parse(required(rest, "/go <view>")?)),
        "/back" => Command::Back,
        "/register" => match args.as_slice() {
            [email, name @ ..] if !name.is_empty() => {
                // Trailing "--password <pw>" is optional; the rest is the display name.
                let (name, password) = split_password(name);
                Command::Register {
                    email: email.to_string(),
                    name,
                    password,
                }
            }
            _ => return Err("usage: /register <email> <name> [--password <pw>]".into()),
        },
        "/login" => match args.as_slice() {
            [email] => Command::Login {
                email: email.to_string(),
                password: None,
            },
            [email, password] => Command::Login {
                email: email.to_string(),
                password: Some(password.to_string()),
            },
            _ => return Err("usage: /login <email> [password]".into()),
        },
        "/google" => match args.as_slice() {
            [uid, email, name @ ..] => Command::ProviderSignIn {
                uid: uid.to_string(),
                email: email.to_string(),
                name: (!name.is_empty()).then(|| name.join(" ")),
            },
            _ => return Err("usage: /google <uid> <email> [name]".into()),
        },
        "/logout" => Command::Logout,
        "/derive" => Command::Derive,
        "/list" => Command::List,
        "/refresh" => Command::Refresh,
        "/open" => Command::Open(required(rest, "/open <number|id>")?.to_string()),
        "/format" => Command::Format(required(rest, "/format <type>")?.to_string()),
        "/formats" => Command::Formats,
        "/privacy" => Command::TogglePrivacy,
        "/edit" => {
            let (title, content) = rest
                .split_once('|')
                .ok_or_else(|| "usage: /edit <title> | <content>".to_string())?;
            Command::EditStory {
                title: title.trim().to_string(),
                content: content.trim().to_string(),
            }
        }
        "/edit-format" => {
            Command::EditFormat(required(rest, "/edit-format <content>")?.to_string())
        }
        "/upload" => Command::Upload(PathBuf::from(required(rest, "/upload <file>")?)),
        "/state" => Command::State,
        "/dismiss" => Command::Dismiss,
        "/help" => Command::Help,
        other => return Err(format!("Unknown command {other}. Type /help for a list.")),
    };
    Ok(command)
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(rest)
    }
}

fn split_password(words: &[&str]) -> (String, Option<String>) {
    match words.iter().position(|w| *w == "--password") {
        Some(i) => (
            words[..i].join(" "),
            words.get(i + 1).map(|p| p.to_string()),
        ),
        None => (words.join(" "), None),
    }
}

pub const HELP: &str = "\
Tabs:      /discover  /share  /stories  /inner-space  /go <view>
Account:   /register <email> <name> [--password <pw>]  /login <email> [password]
           /google <uid> <email> [name]  /logout
Share:     type to talk, /derive to turn the conversation into a story
Stories:   /list  /refresh  /open <number|id>  /privacy  /edit <title> | <content>
Formats:   /formats  /format <type>  /edit-format <content>  /upload <file>
Other:     /back  /state  /dismiss  /help  quit";
