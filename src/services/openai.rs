use anyhow::Result;
use base64::Engine;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    GenerationClient, GenerationRequest, ImageClient, SynthesisClient, TranscriptionClient,
};
use crate::audio::{encode_wav, AudioBuffer};
use crate::error::ServiceError;

/// Connection settings for an OpenAI-compatible API
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub image_model: String,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            chat_model: "gpt-4o".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "tts-1".to_string(),
            image_model: "gpt-image-1".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

/// HTTP client for an OpenAI-compatible API
pub struct OpenAiClient {
    http: Client,
    settings: OpenAiSettings,
}

impl OpenAiClient {
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        info!(
            "API client configured: {} (chat={}, stt={}, tts={})",
            settings.base_url,
            settings.chat_model,
            settings.transcription_model,
            settings.speech_model
        );

        Ok(Self { http, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    async fn check(response: Response) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionClient for OpenAiClient {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, ServiceError> {
        if audio.is_empty() {
            return Ok(String::new());
        }

        let wav = encode_wav(&audio.samples(), audio.sample_rate(), 1)
            .map_err(|e| ServiceError::Request(format!("failed to encode audio: {}", e)))?;

        debug!(
            "Uploading {:.1}s of audio for transcription ({} bytes)",
            audio.duration().as_secs_f64(),
            wav.len()
        );

        let part = multipart::Part::bytes(wav)
            .file_name("utterance.wav")
            .mime_str("audio/wav")?;

        let form = multipart::Form::new()
            .text("model", self.settings.transcription_model.clone())
            .text("response_format", "text")
            .part("file", part);

        let response = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        let text = Self::check(response).await?.text().await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait::async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: request.system_context.as_str(),
        });
        for turn in request.history {
            messages.push(ChatMessage {
                role: turn.role.as_str(),
                content: &turn.text,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.user_text,
        });

        let body = ChatRequest {
            model: &self.settings.chat_model,
            messages,
        };

        let response = self
            .http
            .post(self.url("chat/completions"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ChatResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty completion".to_string()))
    }
}

#[async_trait::async_trait]
impl SynthesisClient for OpenAiClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, ServiceError> {
        let body = SpeechRequest {
            model: &self.settings.speech_model,
            voice,
            input: text,
            response_format: "mp3",
        };

        let response = self
            .http
            .post(self.url("audio/speech"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let bytes = Self::check(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ServiceError::InvalidResponse("empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait::async_trait]
impl ImageClient for OpenAiClient {
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>, ServiceError> {
        let body = ImageRequest {
            model: &self.settings.image_model,
            prompt,
            n: 1,
            size,
            quality: "low",
        };

        let response = self
            .http
            .post(self.url("images/generations"))
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: ImageResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        let encoded = parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| ServiceError::InvalidResponse("no image data".to_string()))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| ServiceError::InvalidResponse(format!("bad image encoding: {}", e)))
    }
}
