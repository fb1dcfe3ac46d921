//! Chat storage manager.
//!
//! Sole owner and writer of the in-memory `ChatState`. Every successful
//! mutation rewrites the whole state to the backing `PersistentStore`;
//! callers only ever receive copies.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};
use crate::persistence::{decode_state, encode_state, PersistentStore};
use crate::types::{ChatSession, ChatState, Message, MessageRole, NewMessage, SessionId, PLACEHOLDER_TITLE};

/// Default maximum title length, in characters
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;

/// Derive a session title from the first user message.
///
/// Whitespace runs collapse to single spaces; text longer than `max_chars`
/// characters is cut on a character boundary and suffixed with `...`.
pub fn derive_title(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.is_empty() {
        return PLACEHOLDER_TITLE.to_string();
    }
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Owns the chat state and keeps the persistent copy in sync
pub struct ChatStorageManager {
    state: ChatState,
    store: Arc<dyn PersistentStore>,
    title_max_chars: usize,
    /// Last timestamp handed out; keeps `updatedAt` strictly increasing
    last_stamp: DateTime<Utc>,
}

impl ChatStorageManager {
    /// Open the manager over a store, restoring whatever it holds.
    ///
    /// A missing, unreadable or malformed payload yields an empty state.
    pub fn open(store: Arc<dyn PersistentStore>) -> Self {
        let state = Self::restore(store.as_ref());
        let last_stamp = state
            .sessions
            .iter()
            .map(|s| s.updated_at.max(s.created_at))
            .max()
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        info!(sessions = state.sessions.len(), "Chat state loaded");

        Self {
            state,
            store,
            title_max_chars: DEFAULT_TITLE_MAX_CHARS,
            last_stamp,
        }
    }

    /// Override the title length bound
    pub fn with_title_limit(mut self, max_chars: usize) -> Self {
        self.title_max_chars = max_chars.max(1);
        self
    }

    fn restore(store: &dyn PersistentStore) -> ChatState {
        let payload = match store.load() {
            Ok(Some(payload)) => payload,
            Ok(None) => return ChatState::default(),
            Err(e) => {
                warn!(error = %e, "Could not read stored chat state, starting empty");
                return ChatState::default();
            }
        };

        match decode_state(&payload) {
            Ok(mut state) => {
                if state.repair_current() {
                    debug!("Stored current session no longer exists, cleared");
                }
                state
            }
            Err(e) => {
                warn!(error = %e, "Discarding stored chat state");
                ChatState::default()
            }
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert a new empty session, make it current and return its id
    pub fn create_session(&mut self) -> SessionId {
        let index = self.insert_session();
        self.persist();
        self.state.sessions[index].id.clone()
    }

    /// Make `id` the current session. Unknown ids are ignored.
    pub fn set_current_session(&mut self, id: &str) -> bool {
        if self.state.find(id).is_none() {
            debug!(session_id = id, "Ignoring switch to unknown session");
            return false;
        }
        if self.state.current_session.as_deref() == Some(id) {
            return true;
        }
        self.state.current_session = Some(id.to_string());
        self.persist();
        true
    }

    /// Append a message to the current session, creating one if needed.
    ///
    /// Assigns an id and timestamp when absent, derives the title from the
    /// first user message and bumps `updatedAt`.
    pub fn add_message(&mut self, message: NewMessage) -> Message {
        let index = match self.current_index() {
            Ok(index) => index,
            Err(e) => {
                debug!(error = %e, "Creating session for incoming message");
                self.insert_session()
            }
        };

        let stamp = self.next_timestamp();
        let stored = Message {
            id: message.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            content: message.content,
            role: message.role,
            sources: message.sources.filter(|s| !s.is_empty()),
            timestamp: message.timestamp.unwrap_or(stamp),
        };

        let title_max_chars = self.title_max_chars;
        let session = &mut self.state.sessions[index];
        if stored.role == MessageRole::User && !session.has_user_message() {
            session.title = derive_title(&stored.content, title_max_chars);
        }
        session.messages.push(stored.clone());
        session.updated_at = stamp;

        debug!(
            session_id = %session.id,
            message_id = %stored.id,
            role = ?stored.role,
            "Message appended"
        );

        self.persist();
        stored
    }

    /// Remove a session. Unknown ids leave the state untouched.
    ///
    /// Deleting the current session leaves no session current.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(index) = self.state.sessions.iter().position(|s| s.id == id) else {
            debug!(session_id = id, "Ignoring delete of unknown session");
            return false;
        };

        self.state.sessions.remove(index);
        if self.state.current_session.as_deref() == Some(id) {
            self.state.current_session = None;
        }

        info!(session_id = id, "Session deleted");
        self.persist();
        true
    }

    /// Drop every session and remove the stored payload
    pub fn clear_all(&mut self) {
        self.state = ChatState::default();
        info!("All sessions cleared");
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear stored chat state");
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sessions whose title contains `term`, case-insensitively, newest first.
    ///
    /// An empty term matches every session.
    pub fn search(&self, term: &str) -> Vec<ChatSession> {
        let needle = term.to_lowercase();
        self.sessions_by_recency()
            .into_iter()
            .filter(|s| needle.is_empty() || s.title.to_lowercase().contains(&needle))
            .collect()
    }

    /// All sessions sorted by `updatedAt` descending
    pub fn sessions_by_recency(&self) -> Vec<ChatSession> {
        let mut sessions = self.state.sessions.clone();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn current_session(&self) -> Option<ChatSession> {
        let id = self.state.current_session.as_deref()?;
        self.state.find(id).cloned()
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.state.current_session.clone()
    }

    pub fn session(&self, id: &str) -> Option<ChatSession> {
        self.state.find(id).cloned()
    }

    /// Copy of the full state
    pub fn snapshot(&self) -> ChatState {
        self.state.clone()
    }

    pub fn len(&self) -> usize {
        self.state.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.sessions.is_empty()
    }

    // Internal

    fn current_index(&self) -> ChatResult<usize> {
        let id = self
            .state
            .current_session
            .as_deref()
            .ok_or(ChatError::NoCurrentSession)?;
        self.state
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ChatError::InvalidSessionReference(id.to_string()))
    }

    fn insert_session(&mut self) -> usize {
        let session = ChatSession::new(self.next_timestamp());
        info!(session_id = %session.id, "Session created");
        self.state.current_session = Some(session.id.clone());
        self.state.sessions.push(session);
        self.state.sessions.len() - 1
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = if now > self.last_stamp {
            now
        } else {
            self.last_stamp + Duration::microseconds(1)
        };
        self.last_stamp = stamp;
        stamp
    }

    fn persist(&self) {
        let result = encode_state(&self.state).and_then(|payload| self.store.save(&payload));
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist chat state");
        }
    }
}
