//! Error types for the voice-turn engine.
//!
//! Service failures are recoverable at the turn boundary; recording and
//! scenario failures end (or prevent) a session.

use std::time::Duration;

/// The audio source could not deliver a chunk. Fatal to the session.
#[derive(Debug, Clone, thiserror::Error)]
#[error("recording device error: {0}")]
pub struct RecordingDeviceError(pub String);

impl RecordingDeviceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failure talking to an external service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// Transport-level failure (connection, TLS, body read).
    #[error("request failed: {0}")]
    Request(String),

    /// Service answered with a non-success status.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// No answer within the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Answer could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Request(err.to_string())
    }
}

/// A recoverable failure of one turn. The session continues.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TurnFailure {
    #[error("transcription service error: {0}")]
    TranscriptionService(ServiceError),

    #[error("generation service error: {0}")]
    GenerationService(ServiceError),

    #[error("synthesis service error: {0}")]
    SynthesisService(ServiceError),
}

impl TurnFailure {
    /// Message shown to the user when a turn has to be repeated.
    pub fn notice(&self) -> &'static str {
        match self {
            TurnFailure::TranscriptionService(_) => {
                "Sorry, I couldn't understand that. Please try again."
            }
            TurnFailure::GenerationService(_) | TurnFailure::SynthesisService(_) => {
                "Sorry, something went wrong on my side. Please try again."
            }
        }
    }
}

/// Scenario text could not be turned into a valid scenario.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario text is not a structured object: {0}")]
    Parse(String),

    #[error("scenario field `{0}` is missing or empty")]
    MissingField(&'static str),

    #[error("scenario field `{field}` must be a string, found {found}")]
    InvalidField { field: &'static str, found: String },
}

/// Errors that end a session (or stop it from starting).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    RecordingDevice(#[from] RecordingDeviceError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}
