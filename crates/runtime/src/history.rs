//! The user-visible transcript of a chat session.

use serde::{Deserialize, Serialize};

/// Who said a turn. Tool traffic never shows up in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Speaker,
    pub content: String,
}

/// Append-only, in-memory transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Speaker::User, content.into());
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Speaker::Assistant, content.into());
    }

    fn push(&mut self, role: Speaker, content: String) {
        self.turns.push(Turn { role, content });
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
