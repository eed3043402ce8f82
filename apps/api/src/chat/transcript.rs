//! Transcript data model: turns, citations, and the append-only turn list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::prompts::GREETING;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A web source the model used to ground its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Displayed body. Grounded assistant turns end with a citation block.
    pub text: String,
    /// Always empty for user turns.
    #[serde(default)]
    pub sources: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sources: vec![],
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            sources,
            created_at: Utc::now(),
        }
    }
}

/// Ordered, append-only list of turns. Insertion order is replayed verbatim as
/// context on every request, so turns are never edited or removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// A fresh transcript holding only the assistant greeting.
    pub fn seeded() -> Self {
        Self {
            turns: vec![Turn::assistant(GREETING, vec![])],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_transcript_starts_with_greeting() {
        let transcript = Transcript::seeded();
        assert_eq!(transcript.len(), 1);
        let first = &transcript.turns()[0];
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.text, GREETING);
        assert!(first.sources.is_empty());
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut transcript = Transcript::seeded();
        transcript.push(Turn::user("first"));
        transcript.push(Turn::assistant("second", vec![]));
        let texts: Vec<_> = transcript.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec![GREETING, "first", "second"]);
        assert_eq!(transcript.turns().last().map(|t| t.role), Some(Role::Assistant));
    }

    #[test]
    fn test_turn_serializes_role_in_snake_case() {
        let value = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["sources"], serde_json::json!([]));
    }
}
