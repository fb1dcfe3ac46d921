//! Error types for the chat system.

use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat system errors.
///
/// Only `ReplyProduction` reaches the user, as a visible notice in place of
/// the assistant reply. The persistence and session variants are absorbed by
/// the storage manager and replaced with a safe default.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Stored chat state is malformed: {0}")]
    PersistenceCorruption(String),

    #[error("No current chat session")]
    NoCurrentSession,

    #[error("Chat session not found: {0}")]
    InvalidSessionReference(String),

    #[error("Reply production failed: {0}")]
    ReplyProduction(String),

    #[error("LLM not configured. Set GEMINI_API_KEY")]
    LlmNotConfigured,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
