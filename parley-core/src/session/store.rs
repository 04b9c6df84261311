//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user input paired with the assistant's reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Text submitted by the user
    pub user_text: String,
    /// Text returned by the provider
    pub assistant_text: String,
    /// Time the turn completed
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a new turn stamped with the current time
    pub fn new(user_text: impl Into<String>, assistant_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            created_at: Utc::now(),
        }
    }

    /// The `(user, assistant)` text pair
    pub fn as_pair(&self) -> (&str, &str) {
        (&self.user_text, &self.assistant_text)
    }
}

// Turns compare by content; the timestamp is display metadata.
impl PartialEq for Turn {
    fn eq(&self, other: &Self) -> bool {
        self.as_pair() == other.as_pair()
    }
}

impl Eq for Turn {}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No turn has completed yet
    Empty,
    /// At least one turn has completed
    Active,
}

/// An append-only, chronologically ordered sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    turns: Vec<Turn>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a session from `(user, assistant)` pairs supplied by a front-end
    pub fn from_pairs<I, U, A>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (U, A)>,
        U: Into<String>,
        A: Into<String>,
    {
        Self {
            turns: pairs
                .into_iter()
                .map(|(user, assistant)| Turn::new(user, assistant))
                .collect(),
        }
    }

    /// Return a new session equal to this one with `turn` appended
    #[must_use]
    pub fn with_turn(&self, turn: Turn) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend(self.turns.iter().cloned());
        turns.push(turn);
        Self { turns }
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The most recent `max_turns` turns, oldest first
    pub fn recent(&self, max_turns: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(max_turns);
        &self.turns[start..]
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        if self.turns.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Active
        }
    }

    /// The session as `(user, assistant)` pairs
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.turns
            .iter()
            .map(|t| (t.user_text.clone(), t.assistant_text.clone()))
            .collect()
    }
}
