//! Conversation turn types
//!
//! Grounded on the teacher's `Turn`/`TurnRole` shape
//! (`core/src/conversation.rs`), generalized: the sales-funnel
//! `ConversationStage` state machine and per-turn intent/entity metadata
//! have no counterpart in this system and are dropped; `language_code` is
//! added per spec §3's Turn entity.

use serde::{Deserialize, Serialize};

/// Role of the speaker in a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn of prior conversation, as supplied by the caller in
/// `Query.conversation_history` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            language_code: None,
            timestamp: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            language_code: None,
            timestamp: None,
        }
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_creation() {
        let turn = Turn::user("What else is Rexdale doing?");
        assert_eq!(turn.role, TurnRole::User);
        assert!(turn.word_count() > 0);

        let turn = Turn::assistant("Rexdale is implementing green roofs.")
            .with_language("es");
        assert_eq!(turn.language_code.as_deref(), Some("es"));
    }
}
