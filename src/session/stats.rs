use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{TerminationReason, TurnState};
use crate::conversation::ConversationTurn;

/// Snapshot published by a running controller after every transition
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,

    /// Current controller state
    pub state: TurnState,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Retained conversation history
    pub history: Vec<ConversationTurn>,

    /// Turns that failed and had to be repeated
    pub failed_turns: usize,

    /// Last user-facing notice (e.g. "please try again")
    pub last_notice: Option<String>,

    /// Set once the session has ended
    pub termination: Option<TerminationReason>,
}

impl SessionStatus {
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            session_id: self.session_id.clone(),
            state: self.state,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            turns_count: self.history.len(),
            failed_turns: self.failed_turns,
            last_notice: self.last_notice.clone(),
            termination: self.termination.clone(),
        }
    }
}

/// Statistics about a conversation session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Current controller state
    pub state: TurnState,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of turns held in memory
    pub turns_count: usize,

    /// Number of failed turns
    pub failed_turns: usize,

    pub last_notice: Option<String>,

    pub termination: Option<TerminationReason>,
}

/// Final result of a session run
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub reason: TerminationReason,
    pub history: Vec<ConversationTurn>,
    pub failed_turns: usize,
}
