// Scripted service fakes shared by the integration tests
#![allow(dead_code)]

use anyhow::Result;
use lingo_voice::audio::{AudioBuffer, AudioChunk, AudioSink, SynthesizedReply};
use lingo_voice::conversation::ConversationTurn;
use lingo_voice::error::ServiceError;
use lingo_voice::services::{
    GenerationClient, GenerationRequest, ImageClient, ServiceHandles, SynthesisClient,
    TranscriptionClient,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RATE: u32 = 16000;

pub const SCENARIO_JSON: &str = r#"{
  "language": "Spanish",
  "level": "beginner",
  "name": "Ana",
  "place": "Tapas bar",
  "background": "A busy bar in Seville with clinking glasses",
  "person_to_talk_to": "waiter",
  "goal": "Order two tapas and a drink"
}"#;

/// Transcribes each utterance to the next scripted result
#[derive(Default)]
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
    calls: Mutex<usize>,
}

impl ScriptedTranscriber {
    pub fn new(script: Vec<Result<String, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl TranscriptionClient for ScriptedTranscriber {
    async fn transcribe(&self, audio: &AudioBuffer) -> Result<String, ServiceError> {
        assert!(!audio.is_empty(), "transcriber got an empty buffer");
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// What a generation call was given
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub system_context: String,
    pub history: Vec<ConversationTurn>,
    pub user_text: String,
}

/// Replies with scripted results; answers scenario prompts with `SCENARIO_JSON`
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
    seen: Mutex<Vec<SeenRequest>>,
    delay: Option<Duration>,
    scenario_text: Option<String>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, ServiceError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    /// Delay every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer scenario prompts with this text instead
    pub fn with_scenario_text(mut self, text: impl Into<String>) -> Self {
        self.scenario_text = Some(text.into());
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerationClient for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<String, ServiceError> {
        if request
            .system_context
            .as_str()
            .contains("Output EXACTLY this format")
        {
            return Ok(self
                .scenario_text
                .clone()
                .unwrap_or_else(|| SCENARIO_JSON.to_string()));
        }

        self.seen.lock().unwrap().push(SeenRequest {
            system_context: request.system_context.as_str().to_string(),
            history: request.history.to_vec(),
            user_text: request.user_text.to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok("Muy bien.".to_string()))
    }
}

/// Returns fixed bytes, or the next scripted failure
#[derive(Default)]
pub struct FakeSynthesizer {
    failures: Mutex<VecDeque<ServiceError>>,
    spoken: Mutex<Vec<String>>,
}

impl FakeSynthesizer {
    pub fn failing_once(error: ServiceError) -> Self {
        Self {
            failures: Mutex::new(VecDeque::from([error])),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SynthesisClient for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Vec<u8>, ServiceError> {
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(format!("mp3:{}", text).into_bytes())
    }
}

/// Returns a tiny fake PNG
#[derive(Default)]
pub struct FakeImages {
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeImages {
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[async_trait::async_trait]
impl ImageClient for FakeImages {
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>, ServiceError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), size.to_string()));
        Ok(FAKE_PNG.to_vec())
    }
}

/// The fakes behind a `ServiceHandles`, kept for inspection
pub struct Fakes {
    pub transcriber: Arc<ScriptedTranscriber>,
    pub generator: Arc<ScriptedGenerator>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub images: Arc<FakeImages>,
}

impl Fakes {
    pub fn new(transcriber: ScriptedTranscriber, generator: ScriptedGenerator) -> Self {
        Self {
            transcriber: Arc::new(transcriber),
            generator: Arc::new(generator),
            synthesizer: Arc::new(FakeSynthesizer::default()),
            images: Arc::new(FakeImages::default()),
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: FakeSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    pub fn handles(&self) -> ServiceHandles {
        ServiceHandles {
            transcription: self.transcriber.clone(),
            generation: self.generator.clone(),
            synthesis: self.synthesizer.clone(),
            images: self.images.clone(),
        }
    }
}

/// Records every reply it is asked to play
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub played: Arc<Mutex<Vec<SynthesizedReply>>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn texts(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.text.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl AudioSink for RecordingSink {
    async fn play(&mut self, reply: &SynthesizedReply) -> Result<()> {
        self.played.lock().unwrap().push(reply.clone());
        if self.fail {
            anyhow::bail!("speaker unplugged");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// One spoken utterance: 3 loud chunks followed by enough silence to endpoint
/// with `fast_endpointing` settings
pub fn utterance() -> Vec<AudioChunk> {
    let loud: Vec<i16> = (0..3200)
        .map(|i| if i % 2 == 0 { 5000 } else { -5000 })
        .collect();
    let mut chunks: Vec<AudioChunk> = (0..3)
        .map(|i| AudioChunk::new(loud.clone(), RATE, i * 200))
        .collect();
    chunks.extend((3..5).map(|i| AudioChunk::silence(RATE, Duration::from_millis(200), i * 200)));
    chunks
}

/// 200ms chunks, 400ms of silence ends an utterance
pub fn fast_endpointing() -> lingo_voice::audio::EndpointingSettings {
    lingo_voice::audio::EndpointingSettings {
        threshold: 800.0,
        silence_duration: Duration::from_millis(400),
        chunk_duration: Duration::from_millis(200),
        max_utterance_duration: None,
    }
}
