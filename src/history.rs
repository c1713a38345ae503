//! Shared conversation history for group coordination
//!
//! This module defines the core data structures the engine, adapters, and
//! strategies exchange: a conversation turn and an append-only shared history.
//! Insertion order is the only ordering; sequence indices are dense and
//! monotonic, and a turn is immutable once appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in the shared conversation.
///
/// The sequence index is assigned by [`SharedHistory::push`]; a turn built
/// through the constructors starts unsequenced at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub text: String,
    pub sequence: usize,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::build(Role::User, None, text.into())
    }

    pub fn assistant(text: impl Into<String>, speaker: impl Into<String>) -> Self {
        Self::build(Role::Assistant, Some(speaker.into()), text.into())
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::build(Role::System, None, text.into())
    }

    fn build(role: Role, speaker: Option<String>, text: String) -> Self {
        Self {
            role,
            speaker,
            text,
            sequence: 0,
            at: Utc::now(),
        }
    }

    /// Render this turn the way remote agents see it: `role (name): text`.
    pub fn render(&self) -> String {
        match &self.speaker {
            Some(name) => format!("{} ({}): {}", self.role, name, self.text),
            None => format!("{}: {}", self.role, self.text),
        }
    }
}

/// Prompt sent when an adapter is invoked against an empty history.
const EMPTY_HISTORY_PROMPT: &str = "Hello";

/// Append-only ordered sequence of turns, shared by reference across all
/// adapters during a round.
///
/// Exactly one writer exists (the coordination engine); adapters and
/// strategies only ever receive `&SharedHistory`. Appending is the only
/// mutation besides [`SharedHistory::clear`] at the end of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedHistory {
    turns: Vec<ConversationTurn>,
}

impl SharedHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn, assigning the next sequence index. Returns the turn as
    /// recorded.
    pub fn push(&mut self, mut turn: ConversationTurn) -> &ConversationTurn {
        let seq = self.turns.len();
        turn.sequence = seq;
        self.turns.push(turn);
        &self.turns[seq]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The trailing `n` turns (all of them if fewer exist).
    pub fn tail(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Render the entire history as one prompt: `role (name): text` lines
    /// joined by blank lines.
    pub fn render_prompt(&self) -> String {
        if self.turns.is_empty() {
            return EMPTY_HISTORY_PROMPT.to_string();
        }
        self.turns
            .iter()
            .map(ConversationTurn::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render only the final turn's text (for adapters configured to receive
    /// the last turn instead of the full transcript).
    pub fn render_last_turn(&self) -> String {
        match self.turns.last() {
            Some(turn) => turn.text.clone(),
            None => EMPTY_HISTORY_PROMPT.to_string(),
        }
    }

    /// Drop all turns. The next run starts from an empty transcript.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_dense_monotonic_sequence() {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("extract the todos"));
        history.push(ConversationTurn::assistant("Found 3 todos", "ConfluenceAgent"));
        history.push(ConversationTurn::assistant("Formatted items", "FormatterAgent"));

        let sequences: Vec<usize> = history.turns().iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn history_is_append_only() {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("first"));
        let before = history.turns().to_vec();

        history.push(ConversationTurn::assistant("second", "a"));
        assert!(history.len() > before.len() - 1);
        // Prior turns are unchanged by later appends.
        assert_eq!(history.turns()[0].text, before[0].text);
        assert_eq!(history.turns()[0].sequence, before[0].sequence);
    }

    #[test]
    fn render_prompt_formats_roles_and_names() {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("extract todos from the page"));
        history.push(ConversationTurn::assistant("Found 2 todos", "ConfluenceAgent"));

        let prompt = history.render_prompt();
        assert_eq!(
            prompt,
            "user: extract todos from the page\n\nassistant (ConfluenceAgent): Found 2 todos"
        );
    }

    #[test]
    fn render_prompt_on_empty_history_falls_back() {
        assert_eq!(SharedHistory::new().render_prompt(), "Hello");
        assert_eq!(SharedHistory::new().render_last_turn(), "Hello");
    }

    #[test]
    fn render_last_turn_takes_only_final_text() {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("first"));
        history.push(ConversationTurn::assistant("second", "a"));
        assert_eq!(history.render_last_turn(), "second");
    }

    #[test]
    fn tail_returns_trailing_window() {
        let mut history = SharedHistory::new();
        for i in 0..5 {
            history.push(ConversationTurn::user(format!("turn {}", i)));
        }
        let tail = history.tail(3);
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].text, "turn 2");

        assert_eq!(history.tail(100).len(), 5);
    }

    #[test]
    fn clear_drops_all_turns() {
        let mut history = SharedHistory::new();
        history.push(ConversationTurn::user("first"));
        history.clear();
        assert!(history.is_empty());
    }
}
