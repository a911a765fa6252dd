use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::EndpointingSettings;
use crate::conversation::RetentionPolicy;
use crate::services::OpenAiSettings;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub services: ServicesConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Directory served under /assets (images, uploads, replies)
    pub assets_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub chunk_duration_ms: u64,
    /// Mean absolute amplitude below which a chunk is silent
    pub silence_threshold: f64,
    pub silence_duration_ms: u64,
    /// Optional cap on a single utterance
    #[serde(default)]
    pub max_utterance_ms: Option<u64>,
    /// Chunks buffered between the audio feeder and the session
    pub feed_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub base_url: String,
    /// Falls back to OPENAI_API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,
    pub chat_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub image_model: String,
    pub voice: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Keep only the most recent N turns (0 or unset = keep everything)
    #[serde(default)]
    pub max_turns: Option<usize>,
    #[serde(default = "default_true")]
    pub open_with_greeting: bool,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            open_with_greeting: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load `path` (any format the config crate knows, extension optional)
    /// with `LINGO__SECTION__KEY` environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LINGO").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Endpointing settings; zero chunk or silence durations are rejected
    pub fn endpointing(&self) -> Result<EndpointingSettings> {
        if self.audio.chunk_duration_ms == 0 {
            bail!("audio.chunk_duration_ms must be greater than zero");
        }
        if self.audio.silence_duration_ms == 0 {
            bail!("audio.silence_duration_ms must be greater than zero");
        }

        Ok(EndpointingSettings {
            threshold: self.audio.silence_threshold,
            silence_duration: Duration::from_millis(self.audio.silence_duration_ms),
            chunk_duration: Duration::from_millis(self.audio.chunk_duration_ms),
            max_utterance_duration: self
                .audio
                .max_utterance_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        })
    }

    /// Session settings for a new session id
    pub fn session_config(&self, session_id: impl Into<String>) -> Result<SessionConfig> {
        Ok(SessionConfig {
            session_id: session_id.into(),
            endpointing: self.endpointing()?,
            service_timeout: Duration::from_secs(self.services.timeout_secs),
            voice: self.services.voice.clone(),
            retention: RetentionPolicy::from_max_turns(self.conversation.max_turns),
            open_with_greeting: self.conversation.open_with_greeting,
        })
    }

    pub fn openai_settings(&self) -> Result<OpenAiSettings> {
        let api_key = match &self.services.api_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => std::env::var("OPENAI_API_KEY")
                .context("No API key: set services.api_key or OPENAI_API_KEY")?,
        };

        Ok(OpenAiSettings {
            base_url: self.services.base_url.clone(),
            api_key,
            chat_model: self.services.chat_model.clone(),
            transcription_model: self.services.transcription_model.clone(),
            speech_model: self.services.speech_model.clone(),
            image_model: self.services.image_model.clone(),
            request_timeout: Duration::from_secs(self.services.timeout_secs),
        })
    }
}
