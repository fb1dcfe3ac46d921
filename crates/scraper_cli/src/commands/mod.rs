//! CLI command definitions.
//!
//! This module defines the command structure for the WebScraper AI CLI
//! and the shared wiring every command opens the chat store through.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use scraper_chat::{
    reply_source_for, ChatConfig, ChatSession, ChatStorageManager, ConversationController, FileStore,
    TokioScheduler,
};

pub mod chat;
pub mod clear;
pub mod delete;
pub mod send;
pub mod sessions;
pub mod show;
pub mod switch;

/// Default data directory, relative to the working directory
const DEFAULT_DATA_DIR: &str = ".webscraper";

/// WebScraper AI - chat assistant for web data extraction
#[derive(Parser)]
#[command(name = "scraper")]
#[command(version, about = "WebScraper AI - chat assistant for web data extraction")]
#[command(long_about = r#"
WebScraper AI keeps chat sessions on disk and answers scraping and pricing
questions. Requests that mention a supported storefront show live source
progress before the reply arrives.

COMMANDS:
  chat      → Interactive chat (trailing \ continues a line)
  send      → Send a single message to the current session
  sessions  → List sessions, newest first
  show      → Print a session's messages
  switch    → Make a session current
  delete    → Delete a session
  clear     → Delete every session

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Reply failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding the chat state and settings
    #[arg(long, global = true, env = "SCRAPER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat
    Chat(chat::ChatArgs),

    /// Send one message and print the reply
    Send(send::SendArgs),

    /// List chat sessions
    Sessions(sessions::SessionsArgs),

    /// Show the messages of a session
    Show(show::ShowArgs),

    /// Make a session current
    Switch(switch::SwitchArgs),

    /// Delete a session
    Delete(delete::DeleteArgs),

    /// Delete all sessions
    Clear(clear::ClearArgs),
}

/// Resolved data directory and settings shared by all commands
pub struct Context {
    pub data_dir: PathBuf,
    pub config: ChatConfig,
}

impl Context {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .context("Failed to resolve working directory")?
                .join(DEFAULT_DATA_DIR),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config = ChatConfig::load(&data_dir);
        debug!(data_dir = %data_dir.display(), provider = ?config.provider, "Context ready");

        Ok(Self { data_dir, config })
    }

    /// Open the chat store in the data directory
    pub fn storage(&self) -> ChatStorageManager {
        ChatStorageManager::open(Arc::new(FileStore::new(&self.data_dir)))
            .with_title_limit(self.config.title_max_chars)
    }

    /// Controller over the chat store with the configured reply provider
    pub fn controller(&self) -> Result<ConversationController> {
        let replies = reply_source_for(&self.config).context("Failed to set up the reply provider")?;
        Ok(ConversationController::from_config(
            &self.config,
            self.storage(),
            replies,
            Arc::new(TokioScheduler),
        ))
    }
}

/// Find a session by full id or unique id prefix
pub fn resolve_session(storage: &ChatStorageManager, id: &str) -> Result<ChatSession> {
    if let Some(session) = storage.session(id) {
        return Ok(session);
    }

    let mut matches: Vec<ChatSession> = storage
        .sessions_by_recency()
        .into_iter()
        .filter(|s| !id.is_empty() && s.id.starts_with(id))
        .collect();

    match matches.len() {
        0 => anyhow::bail!("Session not found: {}", id),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("Session id prefix is ambiguous: {} matches {} sessions", id, n),
    }
}
