use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::RecordingDeviceError;

/// A fixed-duration slice of mono 16-bit PCM
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, mono)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate,
            timestamp_ms,
        }
    }

    /// A chunk of digital silence lasting `duration`
    pub fn silence(sample_rate: u32, duration: Duration, timestamp_ms: u64) -> Self {
        Self::new(
            vec![0; samples_for(sample_rate, duration)],
            sample_rate,
            timestamp_ms,
        )
    }

    /// Split a sample stream into fixed-length chunks.
    ///
    /// The last chunk is zero-padded so every chunk has the same length.
    pub fn split(samples: &[i16], sample_rate: u32, chunk_duration: Duration) -> Vec<Self> {
        let chunk_len = samples_for(sample_rate, chunk_duration).max(1);
        let chunk_ms = chunk_duration.as_millis() as u64;

        samples
            .chunks(chunk_len)
            .enumerate()
            .map(|(i, slice)| {
                let mut chunk_samples = slice.to_vec();
                chunk_samples.resize(chunk_len, 0);
                Self::new(chunk_samples, sample_rate, i as u64 * chunk_ms)
            })
            .collect()
    }

    /// Mean absolute sample amplitude
    pub fn energy(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: u64 = self
            .samples
            .iter()
            .map(|&s| (s as i32).unsigned_abs() as u64)
            .sum();
        sum as f64 / self.samples.len() as f64
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.samples.len() as u64 * 1_000_000_000 / self.sample_rate as u64)
    }
}

/// Number of samples covering `duration` at `sample_rate`
pub fn samples_for(sample_rate: u32, duration: Duration) -> usize {
    (sample_rate as u128 * duration.as_millis() / 1000) as usize
}

/// Audio chunk source trait
///
/// Implementations:
/// - `ChannelChunkSource`: bounded queue fed by an `AudioFeeder` or HTTP uploads
/// - test sources replaying scripted chunks
#[async_trait::async_trait]
pub trait AudioChunkSource: Send {
    /// Wait for the next chunk
    ///
    /// A source that can no longer deliver audio returns `RecordingDeviceError`.
    async fn next_chunk(&mut self) -> Result<AudioChunk, RecordingDeviceError>;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Chunk source backed by a bounded channel
pub struct ChannelChunkSource {
    rx: mpsc::Receiver<AudioChunk>,
    name: String,
}

impl ChannelChunkSource {
    /// Create a bounded queue and the source consuming it
    pub fn channel(capacity: usize, name: impl Into<String>) -> (mpsc::Sender<AudioChunk>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                rx,
                name: name.into(),
            },
        )
    }
}

#[async_trait::async_trait]
impl AudioChunkSource for ChannelChunkSource {
    async fn next_chunk(&mut self) -> Result<AudioChunk, RecordingDeviceError> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| RecordingDeviceError::new(format!("audio feed '{}' closed", self.name)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
