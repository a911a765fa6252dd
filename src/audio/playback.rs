use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use super::decode::decode_audio;
use super::file::write_wav;

/// Synthesized speech for one assistant reply
#[derive(Debug, Clone)]
pub struct SynthesizedReply {
    /// Sequence number the reply has in conversation memory
    pub sequence_number: u64,
    /// Reply text
    pub text: String,
    /// Encoded audio as returned by the synthesis service (mp3)
    pub audio: Vec<u8>,
}

/// Renders synthesized replies
///
/// `play` returns once the reply has finished rendering.
#[async_trait::async_trait]
pub trait AudioSink: Send {
    async fn play(&mut self, reply: &SynthesizedReply) -> Result<()>;

    /// Get sink name for logging
    fn name(&self) -> &str;
}

/// Discards reply audio
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl AudioSink for NullSink {
    async fn play(&mut self, reply: &SynthesizedReply) -> Result<()> {
        debug!(
            "Discarding reply {} ({} bytes)",
            reply.sequence_number,
            reply.audio.len()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Decodes replies and writes them as WAV files (`reply-NNN.wav`)
pub struct WavFileSink {
    output_dir: PathBuf,
}

impl WavFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).context("Failed to create reply output directory")?;

        info!("Replies will be written to {}", output_dir.display());

        Ok(Self { output_dir })
    }
}

#[async_trait::async_trait]
impl AudioSink for WavFileSink {
    async fn play(&mut self, reply: &SynthesizedReply) -> Result<()> {
        let path = self
            .output_dir
            .join(format!("reply-{:03}.wav", reply.sequence_number));
        let audio = reply.audio.clone();
        let target = path.clone();

        // Decoding is CPU-bound
        tokio::task::spawn_blocking(move || -> Result<()> {
            let decoded = decode_audio(&audio, Some("mp3"))?;
            write_wav(&target, &decoded.samples, decoded.sample_rate, decoded.channels)
        })
        .await
        .context("Reply rendering task panicked")??;

        info!("Reply {} written to {}", reply.sequence_number, path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
