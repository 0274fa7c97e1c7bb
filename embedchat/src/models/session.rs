//! Chat session model: a transcript keyed by a client-chosen identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Message, MessageRole};

/// A chat session groups the messages exchanged under one session
/// identifier. Identifiers are opaque strings supplied by the client;
/// the server does not enforce uniqueness beyond map-key identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Client-supplied session identifier.
    pub id: String,
    /// Transcript in conversation order. Append-only.
    pub messages: Vec<Message>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last time the session was saved. Non-decreasing.
    pub last_activity: DateTime<Utc>,
}

impl ChatSession {
    /// Create a new empty session.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Append a message to the transcript, stamped with the current time.
    /// The store must be asked to `save` afterwards for the change to be
    /// visible to other requests.
    pub fn append(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }
}
