//! Capability interfaces to the external speech and language services.
//!
//! The turn engine only sees these traits. `OpenAiClient` is the HTTP
//! implementation used by the binary.

mod openai;

pub use openai::{OpenAiClient, OpenAiSettings};

use std::sync::Arc;

use crate::audio::AudioBuffer;
use crate::conversation::ConversationTurn;
use crate::error::ServiceError;
use crate::scenario::SystemContext;

/// Input of one reply-generation call. Stateless: the caller supplies the
/// whole context every time.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub system_context: &'a SystemContext,
    pub history: &'a [ConversationTurn],
    pub user_text: &'a str,
}

/// Speech-to-text
#[async_trait::async_trait]
pub trait TranscriptionClient: Send + Sync {
    /// Transcribe a mono PCM buffer. Near-silent audio may yield empty text.
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, ServiceError>;
}

/// Dialogue reply generation
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError>;
}

/// Text-to-speech
#[async_trait::async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Returns encoded (compressed) audio bytes
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Image generation for scenario backgrounds and avatars
#[async_trait::async_trait]
pub trait ImageClient: Send + Sync {
    /// Returns PNG bytes
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Service handles constructed once at startup and shared by every session
#[derive(Clone)]
pub struct ServiceHandles {
    pub transcription: Arc<dyn TranscriptionClient>,
    pub generation: Arc<dyn GenerationClient>,
    pub synthesis: Arc<dyn SynthesisClient>,
    pub images: Arc<dyn ImageClient>,
}

impl ServiceHandles {
    /// Use one client for every capability
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: TranscriptionClient + GenerationClient + SynthesisClient + ImageClient + 'static,
    {
        Self {
            transcription: client.clone(),
            generation: client.clone(),
            synthesis: client.clone(),
            images: client,
        }
    }
}
