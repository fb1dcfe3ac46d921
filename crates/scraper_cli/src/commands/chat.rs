//! Chat command - Interactive conversation.
//!
//! Lines ending in `\` continue the draft on the next line, like
//! Shift+Enter in a text box. Lines starting with `/` are commands.

use std::io::Write;

use anyhow::{Context as _, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

use scraper_chat::{key_action, ConversationController, InputAction, Key};

use super::send::run_turn;
use super::{resolve_session, Context};
use crate::render;

#[derive(Args)]
pub struct ChatArgs {
    /// Start in a new session instead of the current one
    #[arg(long)]
    new: bool,
}

/// A slash command typed at the prompt
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    New,
    Sessions,
    Switch(String),
    Delete(String),
    Search(String),
    Close,
    Help,
    Quit,
}

impl ReplCommand {
    /// Parse a `/command [arg]` line; `None` for plain messages
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let rest = line.trim().strip_prefix('/')?;
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let needs_arg = |cmd: fn(String) -> Self| {
            if arg.is_empty() {
                Err(format!("/{} needs an argument", name))
            } else {
                Ok(cmd(arg.to_string()))
            }
        };

        Some(match name {
            "new" => Ok(Self::New),
            "sessions" => Ok(Self::Sessions),
            "switch" => needs_arg(Self::Switch),
            "delete" => needs_arg(Self::Delete),
            // An empty search lists everything
            "search" => Ok(Self::Search(arg.to_string())),
            "close" => Ok(Self::Close),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("Unknown command: /{}", other)),
        })
    }
}

/// Append one input line to the draft.
///
/// Returns true when the draft is ready to submit.
pub fn push_line(draft: &mut String, line: &str) -> bool {
    let (text, continued) = match line.strip_suffix('\\') {
        Some(text) => (text, true),
        None => (line, false),
    };
    draft.push_str(text);

    match key_action(Key::Enter, continued, false) {
        InputAction::InsertNewline => {
            draft.push('\n');
            false
        }
        _ => true,
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /new             Start a new session");
    println!("  /sessions        List sessions");
    println!("  /switch <id>     Switch to a session");
    println!("  /delete <id>     Delete a session");
    println!("  /search <term>   Search session titles");
    println!("  /close           Hide the sources panel");
    println!("  /quit            Leave the chat");
    println!("End a line with \\ to continue typing on the next line.");
}

/// Apply a slash command; returns false when the chat should end
fn apply(command: ReplCommand, controller: &mut ConversationController) -> bool {
    if command == ReplCommand::Close {
        controller.feed().close();
        println!("Sources panel closed");
        return true;
    }

    let storage = controller.storage_mut();
    match command {
        ReplCommand::New => {
            storage.create_session();
            println!("✨ New chat started");
        }
        ReplCommand::Sessions => render::print_sessions(storage, ""),
        ReplCommand::Search(term) => render::print_sessions(storage, &term),
        ReplCommand::Switch(id) => match resolve_session(storage, &id) {
            Ok(session) => {
                storage.set_current_session(&session.id);
                println!("➡️  Switched to \"{}\"", session.title);
                for message in &session.messages {
                    render::print_message(message);
                }
            }
            Err(e) => println!("⚠️  {}", e),
        },
        ReplCommand::Delete(id) => match resolve_session(storage, &id) {
            Ok(session) => {
                storage.delete_session(&session.id);
                println!("🗑️  Deleted \"{}\"", session.title);
            }
            Err(e) => println!("⚠️  {}", e),
        },
        ReplCommand::Help => print_help(),
        ReplCommand::Close => {}
        ReplCommand::Quit => return false,
    }
    true
}

pub async fn execute(ctx: &Context, args: ChatArgs) -> Result<()> {
    let (tx, mut snapshots) = mpsc::unbounded_channel();
    let mut controller = ctx.controller()?.with_observer(tx);

    if args.new {
        controller.storage_mut().create_session();
    }

    println!("🤖 WebScraper AI (type /help for commands, /quit to leave)");
    if let Some(session) = controller.storage().current_session() {
        println!("   Continuing \"{}\"", session.title);
    }
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut draft = String::new();

    loop {
        if draft.is_empty() {
            print!("> ");
        } else {
            print!(". ");
        }
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        if draft.is_empty() {
            if let Some(parsed) = ReplCommand::parse(&line) {
                match parsed {
                    Ok(command) => {
                        if !apply(command, &mut controller) {
                            break;
                        }
                    }
                    Err(e) => println!("⚠️  {}", e),
                }
                continue;
            }
        }

        if !push_line(&mut draft, &line) {
            continue;
        }

        let text = std::mem::take(&mut draft);
        if let Err(e) = run_turn(&mut controller, &mut snapshots, &text).await {
            // The notice is already on screen; keep chatting
            warn!(error = %e, "Turn failed");
        }
    }

    println!("👋 Bye");
    Ok(())
}
