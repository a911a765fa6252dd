use serde::Serialize;

use crate::conversation::ConversationTurn;
use crate::error::TurnFailure;

/// Phrases that end a session, compared after normalization
pub const TERMINATION_PHRASES: [&str; 4] = ["stop", "bye", "exit", "quit"];

/// Turn controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Recording,
    Transcribing,
    CheckingTermination,
    Generating,
    Synthesizing,
    Playing,
    Terminated,
}

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The user said a termination phrase
    Phrase { phrase: String },
    /// The session was cancelled from outside
    Cancelled,
    /// The audio source failed
    DeviceFailure { message: String },
}

/// Result of one controller step
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The scenario character spoke first
    Opened { assistant: ConversationTurn },
    /// A full exchange was committed to memory
    Replied {
        user: ConversationTurn,
        assistant: ConversationTurn,
    },
    /// The utterance transcribed to nothing; memory unchanged
    NothingHeard,
    /// A service failed; memory unchanged, the user should repeat
    Failed(TurnFailure),
    /// The session is over
    Ended(TerminationReason),
}

/// Lower-case, trim and drop one trailing period
pub fn normalize_transcript(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    lowered
        .strip_suffix('.')
        .unwrap_or(&lowered)
        .trim_end()
        .to_string()
}

/// The termination phrase `text` matches, if any
pub fn termination_phrase(text: &str) -> Option<&'static str> {
    let normalized = normalize_transcript(text);
    TERMINATION_PHRASES
        .iter()
        .copied()
        .find(|phrase| *phrase == normalized)
}
