use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{AudioChunk, AudioChunkSource};
use crate::error::RecordingDeviceError;

/// Endpointing configuration
#[derive(Debug, Clone)]
pub struct EndpointingSettings {
    /// Chunks with mean absolute amplitude below this count as silent
    pub threshold: f64,
    /// Sustained silence that ends an utterance (default: 4 seconds)
    pub silence_duration: Duration,
    /// Nominal duration of one chunk (default: 200ms)
    pub chunk_duration: Duration,
    /// Optional cap on utterance length (default: none)
    pub max_utterance_duration: Option<Duration>,
}

impl Default for EndpointingSettings {
    fn default() -> Self {
        Self {
            threshold: 800.0,
            silence_duration: Duration::from_secs(4),
            chunk_duration: Duration::from_millis(200),
            max_utterance_duration: None,
        }
    }
}

impl EndpointingSettings {
    /// Number of consecutive silent chunks that end an utterance (at least one)
    pub fn silent_chunks_required(&self) -> u32 {
        let chunk_ms = self.chunk_duration.as_millis().max(1);
        (self.silence_duration.as_millis().div_ceil(chunk_ms) as u32).max(1)
    }

    pub fn is_silent(&self, chunk: &AudioChunk) -> bool {
        chunk.energy() < self.threshold
    }
}

/// Audio captured for one utterance, in arrival order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioBuffer {
    chunks: Vec<AudioChunk>,
    sample_rate: Option<u32>,
    duration: Duration,
    truncated: bool,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. All chunks of a buffer must share one sample rate.
    pub fn push(&mut self, chunk: AudioChunk) -> Result<(), RecordingDeviceError> {
        match self.sample_rate {
            Some(rate) if rate != chunk.sample_rate => {
                return Err(RecordingDeviceError::new(format!(
                    "sample rate changed mid-utterance: {}Hz -> {}Hz",
                    rate, chunk.sample_rate
                )));
            }
            Some(_) => {}
            None => self.sample_rate = Some(chunk.sample_rate),
        }
        self.duration += chunk.duration();
        self.chunks.push(chunk);
        Ok(())
    }

    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sample rate shared by every chunk (0 for an empty buffer)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(0)
    }

    pub fn sample_count(&self) -> usize {
        self.chunks.iter().map(|c| c.samples.len()).sum()
    }

    /// All samples concatenated
    pub fn samples(&self) -> Vec<i16> {
        let mut samples = Vec::with_capacity(self.sample_count());
        for chunk in &self.chunks {
            samples.extend_from_slice(&chunk.samples);
        }
        samples
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whether capture stopped at the length cap rather than on silence
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Silence-based utterance recorder
///
/// Pulls chunks from a source until enough consecutive silent chunks arrive,
/// then returns everything captured, trailing silence included.
#[derive(Debug, Clone)]
pub struct EndpointingRecorder {
    settings: EndpointingSettings,
}

impl EndpointingRecorder {
    pub fn new(settings: EndpointingSettings) -> Self {
        info!(
            "Endpointing recorder initialized: threshold={}, silence={:?} ({} chunks of {:?})",
            settings.threshold,
            settings.silence_duration,
            settings.silent_chunks_required(),
            settings.chunk_duration
        );

        Self { settings }
    }

    pub fn settings(&self) -> &EndpointingSettings {
        &self.settings
    }

    /// Record one utterance from `source`
    pub async fn record_utterance(
        &self,
        source: &mut dyn AudioChunkSource,
    ) -> Result<AudioBuffer, RecordingDeviceError> {
        record_utterance(source, &self.settings).await
    }
}

/// Read chunks until `silent_chunks_required` consecutive silent chunks arrive
pub async fn record_utterance(
    source: &mut dyn AudioChunkSource,
    settings: &EndpointingSettings,
) -> Result<AudioBuffer, RecordingDeviceError> {
    let mut buffer = AudioBuffer::new();
    let mut silent_chunks: u32 = 0;
    let required = settings.silent_chunks_required();

    debug!("Recording utterance from {}", source.name());

    loop {
        let chunk = source.next_chunk().await?;

        if settings.is_silent(&chunk) {
            silent_chunks += 1;
        } else {
            silent_chunks = 0;
        }

        buffer.push(chunk)?;

        if silent_chunks >= required {
            break;
        }

        if let Some(cap) = settings.max_utterance_duration {
            if buffer.duration() >= cap {
                warn!(
                    "Utterance reached the {:?} cap before silence; returning truncated buffer",
                    cap
                );
                buffer.truncated = true;
                break;
            }
        }
    }

    info!(
        "Utterance complete: {} chunks ({:.1}s)",
        buffer.chunk_count(),
        buffer.duration().as_secs_f64()
    );

    Ok(buffer)
}
