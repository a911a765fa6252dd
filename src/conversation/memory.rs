use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One user utterance or one assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// Position in the session, starting at 1
    pub sequence_number: u64,
}

/// How much history a session keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep every turn for the life of the session
    #[default]
    Unbounded,
    /// Keep only the most recent `max_turns` turns
    SlidingWindow { max_turns: usize },
}

impl RetentionPolicy {
    /// `None` or `Some(0)` means unbounded
    pub fn from_max_turns(max_turns: Option<usize>) -> Self {
        match max_turns {
            Some(max_turns) if max_turns > 0 => RetentionPolicy::SlidingWindow { max_turns },
            _ => RetentionPolicy::Unbounded,
        }
    }
}

/// Chronological turn history of one session
///
/// `append` is the only mutator. Turns are never reordered; under a sliding
/// window the oldest turns are evicted first.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    policy: RetentionPolicy,
    next_sequence: u64,
}

impl ConversationMemory {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            turns: VecDeque::new(),
            policy,
            next_sequence: 1,
        }
    }

    /// Add a turn at the end and return it
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> &ConversationTurn {
        let turn = ConversationTurn {
            role,
            text: text.into(),
            sequence_number: self.next_sequence.max(1),
        };
        self.next_sequence = turn.sequence_number + 1;
        self.turns.push_back(turn);

        if let RetentionPolicy::SlidingWindow { max_turns } = self.policy {
            while self.turns.len() > max_turns {
                if let Some(evicted) = self.turns.pop_front() {
                    debug!("Evicted turn {} from memory", evicted.sequence_number);
                }
            }
        }

        &self.turns[self.turns.len() - 1]
    }

    /// Retained turns in chronological order
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Borrowing iterator over retained turns
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Total turns ever appended, evicted ones included
    pub fn total_appended(&self) -> u64 {
        self.next_sequence.saturating_sub(1)
    }

    /// Sequence number the next appended turn will get
    pub fn next_sequence_number(&self) -> u64 {
        self.next_sequence.max(1)
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }
}
