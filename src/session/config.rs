use std::time::Duration;

use crate::audio::EndpointingSettings;
use crate::conversation::RetentionPolicy;

/// Configuration for a conversation session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-<uuid>")
    pub session_id: String,

    /// Silence detection for the user's utterances
    pub endpointing: EndpointingSettings,

    /// Upper bound for each transcription, generation and synthesis call
    /// Default: 30 seconds
    pub service_timeout: Duration,

    /// Voice identifier passed to the synthesis service
    pub voice: String,

    /// How much history is kept and sent with each generation call
    pub retention: RetentionPolicy,

    /// Let the scenario character speak first
    pub open_with_greeting: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            endpointing: EndpointingSettings::default(),
            service_timeout: Duration::from_secs(30),
            voice: "nova".to_string(),
            retention: RetentionPolicy::Unbounded,
            open_with_greeting: true,
        }
    }
}
