// Audio feeder: moves blocking device/file reads off the session task
//
// A reader runs on a blocking thread and pushes chunks into a bounded queue.
// The session consumes the queue through a `ChannelChunkSource`, so device I/O
// and network I/O never share a blocking path.

use anyhow::Result;
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::backend::{AudioChunk, ChannelChunkSource};
use super::endpoint::EndpointingSettings;
use super::file::AudioFile;

/// Blocking producer of audio chunks
///
/// `Ok(None)` means the stream has ended.
pub trait ChunkReader: Send + 'static {
    fn read_chunk(&mut self) -> Result<Option<AudioChunk>>;

    fn name(&self) -> &str;
}

/// Spawns the feeding task for a reader
pub struct AudioFeeder;

impl AudioFeeder {
    /// Start feeding `reader` into a queue of `capacity` chunks
    ///
    /// The task stops when the reader ends, the queue's consumer is dropped,
    /// or `cancel` fires. It returns the number of chunks delivered.
    pub fn spawn<R: ChunkReader>(
        mut reader: R,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (ChannelChunkSource, JoinHandle<Result<usize>>) {
        let (tx, source) = ChannelChunkSource::channel(capacity, reader.name().to_string());

        let handle = tokio::task::spawn_blocking(move || {
            info!("Audio feeder started: {}", reader.name());
            let mut delivered = 0usize;

            while !cancel.is_cancelled() {
                let chunk = match reader.read_chunk() {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Audio reader {} failed: {}", reader.name(), e);
                        return Err(e);
                    }
                };

                if tx.blocking_send(chunk).is_err() {
                    // Consumer gone
                    break;
                }
                delivered += 1;
            }

            info!(
                "Audio feeder stopped: {} ({} chunks delivered)",
                reader.name(),
                delivered
            );
            Ok(delivered)
        });

        (source, handle)
    }
}

/// Replays WAV files as a chunk stream
///
/// Each file is treated as one utterance and padded with just enough silence
/// for the recorder to endpoint it (see `utterance_chunks`). With `realtime`
/// set the reader sleeps one chunk duration per chunk, like a capture device.
pub struct WavChunkReader {
    files: VecDeque<PathBuf>,
    pending: VecDeque<AudioChunk>,
    settings: EndpointingSettings,
    realtime: bool,
    elapsed_ms: u64,
}

impl WavChunkReader {
    pub fn new(files: Vec<PathBuf>, settings: EndpointingSettings) -> Self {
        Self {
            files: files.into(),
            pending: VecDeque::new(),
            settings,
            realtime: false,
            elapsed_ms: 0,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn load_next_file(&mut self) -> Result<bool> {
        let Some(path) = self.files.pop_front() else {
            return Ok(false);
        };

        let audio = AudioFile::open(&path)?;
        self.pending.extend(utterance_chunks(
            &audio.mono_samples(),
            audio.sample_rate,
            &self.settings,
        ));
        Ok(true)
    }
}

impl ChunkReader for WavChunkReader {
    fn read_chunk(&mut self) -> Result<Option<AudioChunk>> {
        while self.pending.is_empty() {
            if !self.load_next_file()? {
                return Ok(None);
            }
        }

        let Some(mut chunk) = self.pending.pop_front() else {
            return Ok(None);
        };

        let chunk_duration = self.settings.chunk_duration;
        if self.realtime {
            std::thread::sleep(chunk_duration);
        }

        chunk.timestamp_ms = self.elapsed_ms;
        self.elapsed_ms += chunk_duration.as_millis() as u64;

        Ok(Some(chunk))
    }

    fn name(&self) -> &str {
        "wav-replay"
    }
}

/// Chunk a complete utterance and pad it so it endpoints exactly at its end
///
/// Quiet chunks already at the end of the audio count toward the silence run
/// and any beyond it are dropped, so the recorder stops on the last chunk and
/// nothing is left queued for the next utterance.
pub fn utterance_chunks(
    samples: &[i16],
    sample_rate: u32,
    settings: &EndpointingSettings,
) -> Vec<AudioChunk> {
    let chunk_duration = settings.chunk_duration;
    let mut chunks = AudioChunk::split(samples, sample_rate, chunk_duration);

    let required = settings.silent_chunks_required() as usize;
    let trailing_quiet = chunks
        .iter()
        .rev()
        .take_while(|chunk| settings.is_silent(chunk))
        .count();
    if trailing_quiet > required {
        chunks.truncate(chunks.len() - (trailing_quiet - required));
    }
    let padding = required.saturating_sub(trailing_quiet) as u64;

    let chunk_ms = chunk_duration.as_millis() as u64;
    let offset = chunks.len() as u64;
    for i in 0..padding {
        chunks.push(AudioChunk::silence(
            sample_rate,
            chunk_duration,
            (offset + i) * chunk_ms,
        ));
    }

    chunks
}
