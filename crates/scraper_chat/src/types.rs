//! Core types for the chat store and the source feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a chat session
pub type SessionId = String;

/// Title carried by a session until its first user message arrives
pub const PLACEHOLDER_TITLE: &str = "New Chat";

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Progress status of a scraped source.
///
/// Transitions only move forward: `Idle -> Loading -> {Success | Error}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl SourceStatus {
    /// Position in the lifecycle; terminal states share the last rank.
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Loading => 1,
            Self::Success | Self::Error => 2,
        }
    }

    /// Whether the status is final for a pipeline run
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// Whether moving to `next` keeps the lifecycle monotonic.
    ///
    /// Staying put is allowed; a terminal status never changes.
    pub fn can_advance_to(self, next: SourceStatus) -> bool {
        if self == next {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// One simulated external data origin attached to an assistant reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapedSource {
    pub id: String,
    pub url: String,
    pub title: String,
    pub favicon: String,
    pub status: SourceStatus,
    pub timestamp: DateTime<Utc>,
}

impl ScrapedSource {
    /// Create a fresh `Idle` source with a generated id
    pub fn new(url: impl Into<String>, title: impl Into<String>, favicon: impl Into<String>) -> Self {
        Self {
            id: format!("source_{}", uuid::Uuid::new_v4()),
            url: url.into(),
            title: title.into(),
            favicon: favicon.into(),
            status: SourceStatus::Idle,
            timestamp: Utc::now(),
        }
    }

    /// Copy of this source with a new status, if the move is monotonic
    pub fn advanced(&self, status: SourceStatus) -> Self {
        let mut next = self.clone();
        if self.status.can_advance_to(status) {
            next.status = status;
        }
        next
    }
}

/// A single chat message. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ScrapedSource>>,
    pub timestamp: DateTime<Utc>,
}

/// Message as handed to the storage manager; id and timestamp are optional
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Option<String>,
    pub content: String,
    pub role: MessageRole,
    pub sources: Option<Vec<ScrapedSource>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewMessage {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            role: MessageRole::User,
            sources: None,
            timestamp: None,
        }
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            role: MessageRole::Assistant,
            sources: None,
            timestamp: None,
        }
    }

    /// Attach sources; an empty batch is stored as no sources
    pub fn with_sources(mut self, sources: Vec<ScrapedSource>) -> Self {
        self.sources = if sources.is_empty() { None } else { Some(sources) };
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A named, ordered conversation thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session stamped with `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: PLACEHOLDER_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any user message has been recorded yet
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == MessageRole::User)
    }
}

/// The whole persisted chat state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatState {
    #[serde(default)]
    pub sessions: Vec<ChatSession>,
    #[serde(rename = "currentSession", default)]
    pub current_session: Option<SessionId>,
}

impl ChatState {
    pub fn find(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Drop a dangling current reference
    pub fn repair_current(&mut self) -> bool {
        match &self.current_session {
            Some(id) if self.find(id).is_none() => {
                self.current_session = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_monotonic() {
        assert!(SourceStatus::Idle.can_advance_to(SourceStatus::Loading));
        assert!(SourceStatus::Loading.can_advance_to(SourceStatus::Success));
        assert!(SourceStatus::Loading.can_advance_to(SourceStatus::Error));
        assert!(SourceStatus::Idle.can_advance_to(SourceStatus::Success));
        assert!(!SourceStatus::Loading.can_advance_to(SourceStatus::Idle));
        assert!(!SourceStatus::Success.can_advance_to(SourceStatus::Error));
        assert!(!SourceStatus::Error.can_advance_to(SourceStatus::Loading));
    }

    #[test]
    fn test_advanced_never_regresses() {
        let source = ScrapedSource::new("https://a.example", "A", "https://a.example/favicon.ico");
        let done = source.advanced(SourceStatus::Loading).advanced(SourceStatus::Success);
        assert_eq!(done.status, SourceStatus::Success);
        assert_eq!(done.advanced(SourceStatus::Loading).status, SourceStatus::Success);
        assert_eq!(done.id, source.id);
    }

    #[test]
    fn test_state_serializes_with_wire_names() {
        let mut session = ChatSession::new(Utc::now());
        session.messages.push(Message {
            id: "m1".to_string(),
            content: "hello".to_string(),
            role: MessageRole::User,
            sources: None,
            timestamp: Utc::now(),
        });
        let state = ChatState {
            current_session: Some(session.id.clone()),
            sessions: vec![session],
        };

        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("currentSession").is_some());
        let stored = &json["sessions"][0];
        assert!(stored.get("createdAt").is_some());
        assert!(stored.get("updatedAt").is_some());
        assert_eq!(stored["messages"][0]["role"], "user");
        assert!(stored["messages"][0].get("sources").is_none());
    }

    #[test]
    fn test_repair_current_clears_dangling_reference() {
        let mut state = ChatState {
            sessions: Vec::new(),
            current_session: Some("gone".to_string()),
        };
        assert!(state.repair_current());
        assert_eq!(state.current_session, None);
    }

    #[test]
    fn test_empty_sources_are_dropped() {
        let msg = NewMessage::assistant("hi").with_sources(Vec::new());
        assert!(msg.sources.is_none());
    }
}
