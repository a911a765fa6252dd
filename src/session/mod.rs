//! Conversation session management
//!
//! This module provides the turn-taking engine and everything around it:
//! - `Session`: scenario, bound system context and memory of one conversation
//! - `TurnController`: the record → transcribe → reply → speak state machine
//! - `SessionRegistry`: concurrent sessions keyed by id, with atomic creation
//! - Session status snapshots and statistics

mod config;
mod controller;
mod registry;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use controller::{TurnController, OPENING_INSTRUCTION};
pub use registry::{RegistryError, Reservation, SessionHandle, SessionRegistry};
pub use session::Session;
pub use state::{
    normalize_transcript, termination_phrase, TerminationReason, TurnOutcome, TurnState,
    TERMINATION_PHRASES,
};
pub use stats::{SessionStats, SessionStatus, SessionSummary};
