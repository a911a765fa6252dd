// Integration tests for silence-based endpointing
//
// These tests feed scripted chunk sequences through a channel source and
// verify where the recorder decides an utterance has ended.

use anyhow::Result;
use lingo_voice::audio::{
    record_utterance, utterance_chunks, write_wav, AudioBuffer, AudioChunk, AudioFeeder,
    ChannelChunkSource, EndpointingRecorder, EndpointingSettings, WavChunkReader,
};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const RATE: u32 = 16000;
const CHUNK_SAMPLES: usize = 3200; // 200ms at 16kHz

/// 200ms chunks, 600ms of silence ends an utterance (3 chunks)
fn settings() -> EndpointingSettings {
    EndpointingSettings {
        threshold: 800.0,
        silence_duration: Duration::from_millis(600),
        chunk_duration: Duration::from_millis(200),
        max_utterance_duration: None,
    }
}

fn chunk_with_level(level: i16, index: u64) -> AudioChunk {
    // Alternate sign so the chunk looks like a waveform, not DC
    let samples = (0..CHUNK_SAMPLES)
        .map(|i| if i % 2 == 0 { level } else { -level })
        .collect();
    AudioChunk::new(samples, RATE, index * 200)
}

fn loud(index: u64) -> AudioChunk {
    chunk_with_level(4000, index)
}

fn quiet(index: u64) -> AudioChunk {
    chunk_with_level(20, index)
}

fn speech(samples: usize) -> Vec<i16> {
    (0..samples)
        .map(|i| if i % 2 == 0 { 3000 } else { -3000 })
        .collect()
}

/// Queue `chunks` and close the feed
async fn scripted(chunks: Vec<AudioChunk>) -> Result<ChannelChunkSource> {
    let (tx, source) = ChannelChunkSource::channel(chunks.len().max(1), "scripted");
    for chunk in chunks {
        tx.send(chunk).await?;
    }
    Ok(source)
}

#[test]
fn test_silent_chunks_required_rounds_up() {
    let mut s = settings();
    assert_eq!(s.silent_chunks_required(), 3);

    s.silence_duration = Duration::from_millis(500);
    assert_eq!(s.silent_chunks_required(), 3);

    let defaults = EndpointingSettings::default();
    assert_eq!(defaults.silent_chunks_required(), 20);
}

#[test]
fn test_chunk_energy_is_mean_absolute_amplitude() {
    assert_eq!(loud(0).energy(), 4000.0);
    assert_eq!(quiet(0).energy(), 20.0);
    assert_eq!(AudioChunk::new(vec![], RATE, 0).energy(), 0.0);
    assert_eq!(AudioChunk::new(vec![i16::MIN, i16::MAX], RATE, 0).energy(), 32767.5);
}

#[tokio::test]
async fn test_speech_then_silence_ends_utterance() -> Result<()> {
    let mut chunks: Vec<AudioChunk> = (0..5).map(loud).collect();
    chunks.extend((5..8).map(quiet));
    // Extra chunks after the endpoint must stay queued
    chunks.extend((8..10).map(loud));

    let mut source = scripted(chunks).await?;
    let buffer = record_utterance(&mut source, &settings()).await?;

    assert_eq!(buffer.chunk_count(), 8, "5 speech + 3 silent chunks");
    assert_eq!(buffer.sample_rate(), RATE);
    assert_eq!(buffer.sample_count(), 8 * CHUNK_SAMPLES);
    assert_eq!(buffer.duration(), Duration::from_millis(1600));
    assert!(!buffer.is_truncated());

    // Trailing silence is part of the buffer
    assert_eq!(buffer.chunks()[7].energy(), 20.0);

    // The next utterance starts with the chunks left behind
    let next = record_utterance(&mut source, &settings()).await;
    assert!(next.is_err(), "feed closes before 3 silent chunks arrive");

    Ok(())
}

#[tokio::test]
async fn test_speech_resets_silence_counter() -> Result<()> {
    // Two silent chunks, speech again, then a full silence run
    let chunks = vec![
        loud(0),
        quiet(1),
        quiet(2),
        loud(3),
        quiet(4),
        quiet(5),
        quiet(6),
    ];

    let mut source = scripted(chunks).await?;
    let buffer = record_utterance(&mut source, &settings()).await?;

    assert_eq!(buffer.chunk_count(), 7);
    Ok(())
}

#[tokio::test]
async fn test_oscillating_audio_never_endpoints() -> Result<()> {
    // Never three silent chunks in a row
    let chunks: Vec<AudioChunk> = (0..60)
        .map(|i| if i % 3 == 2 { loud(i) } else { quiet(i) })
        .collect();

    let mut source = scripted(chunks).await?;
    let result = record_utterance(&mut source, &settings()).await;

    // Only the exhausted feed stops the recorder
    let err = result.expect_err("recording should not endpoint");
    assert!(err.to_string().contains("closed"));
    Ok(())
}

#[tokio::test]
async fn test_leading_silence_ends_utterance() -> Result<()> {
    let chunks: Vec<AudioChunk> = (0..5).map(quiet).collect();

    let mut source = scripted(chunks).await?;
    let buffer = record_utterance(&mut source, &settings()).await?;

    assert_eq!(buffer.chunk_count(), 3);
    assert!(buffer.chunks().iter().all(|c| c.energy() < 800.0));
    Ok(())
}

#[tokio::test]
async fn test_energy_at_threshold_counts_as_speech() -> Result<()> {
    let mut chunks: Vec<AudioChunk> = (0..3).map(|i| chunk_with_level(800, i)).collect();
    chunks.extend((3..6).map(quiet));

    let mut source = scripted(chunks).await?;
    let buffer = record_utterance(&mut source, &settings()).await?;

    assert_eq!(buffer.chunk_count(), 6);
    Ok(())
}

#[tokio::test]
async fn test_max_utterance_duration_truncates() -> Result<()> {
    let chunks: Vec<AudioChunk> = (0..20).map(loud).collect();

    let recorder = EndpointingRecorder::new(EndpointingSettings {
        max_utterance_duration: Some(Duration::from_secs(1)),
        ..settings()
    });

    let mut source = scripted(chunks).await?;
    let buffer = recorder.record_utterance(&mut source).await?;

    assert_eq!(buffer.chunk_count(), 5);
    assert!(buffer.is_truncated());
    Ok(())
}

#[tokio::test]
async fn test_sample_rate_change_is_a_device_error() -> Result<()> {
    let chunks = vec![
        loud(0),
        AudioChunk::new(vec![4000; 1600], 8000, 200),
        quiet(2),
    ];

    let mut source = scripted(chunks).await?;
    let err = record_utterance(&mut source, &settings())
        .await
        .expect_err("mixed sample rates must be rejected");

    assert!(err.to_string().contains("sample rate"));
    Ok(())
}

#[tokio::test]
async fn test_closed_feed_is_a_device_error() -> Result<()> {
    let (tx, mut source) = ChannelChunkSource::channel(4, "closed");
    drop(tx);

    let result = record_utterance(&mut source, &settings()).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_wav_feeder_replays_utterances() -> Result<()> {
    let temp_dir = TempDir::new()?;

    // Two 1 second utterances
    let speech = speech(RATE as usize);
    let first = temp_dir.path().join("first.wav");
    let second = temp_dir.path().join("second.wav");
    write_wav(&first, &speech, RATE, 1)?;
    write_wav(&second, &speech, RATE, 1)?;

    let s = settings();
    let reader = WavChunkReader::new(vec![first, second], s.clone());
    let (mut source, feeder) = AudioFeeder::spawn(reader, 4, CancellationToken::new());

    let recorder = EndpointingRecorder::new(s);
    let one = recorder.record_utterance(&mut source).await?;
    let two = recorder.record_utterance(&mut source).await?;

    assert_eq!(one.chunk_count(), 8, "5 speech + 3 trailing silence");
    assert_eq!(two.chunk_count(), 8);
    assert!(one.samples().iter().take(CHUNK_SAMPLES).all(|sample| sample.abs() == 3000));

    // Feed is exhausted afterwards
    assert!(recorder.record_utterance(&mut source).await.is_err());

    let delivered = feeder.await??;
    assert_eq!(delivered, 16);

    Ok(())
}

#[test]
fn test_buffer_duration_tracks_pushes() -> Result<()> {
    let mut buffer = AudioBuffer::new();
    assert_eq!(buffer.duration(), Duration::ZERO);

    buffer.push(loud(0))?;
    buffer.push(AudioChunk::new(vec![0; 1600], RATE, 200))?;
    assert_eq!(buffer.duration(), Duration::from_millis(300));

    // A rejected chunk does not count
    assert!(buffer.push(AudioChunk::new(vec![0; 800], 8000, 300)).is_err());
    assert_eq!(buffer.duration(), Duration::from_millis(300));
    Ok(())
}

#[test]
fn test_utterance_padding_counts_trailing_quiet() {
    let s = settings();

    // 3 full chunks and a mostly zero-padded fourth, which is already quiet
    let chunks = utterance_chunks(&speech(9650), RATE, &s);
    assert_eq!(chunks.len(), 6, "4 audio chunks + 2 padding");

    // Long trailing silence is cut back to exactly one silence run
    let mut samples = speech(CHUNK_SAMPLES);
    samples.extend(std::iter::repeat(0).take(10 * CHUNK_SAMPLES));
    assert_eq!(utterance_chunks(&samples, RATE, &s).len(), 4);

    // Pure silence still yields one run
    assert_eq!(utterance_chunks(&[0; 16000], RATE, &s).len(), 3);
    assert_eq!(utterance_chunks(&[], RATE, &s).len(), 3);
}

#[tokio::test]
async fn test_consecutive_uploads_at_different_rates() -> Result<()> {
    let s = settings();

    let mut chunks = utterance_chunks(&speech(9650), RATE, &s);
    chunks.extend(utterance_chunks(&speech(8000), 8000, &s));

    let mut source = scripted(chunks).await?;
    let one = record_utterance(&mut source, &s).await?;
    let two = record_utterance(&mut source, &s).await?;

    assert_eq!(one.sample_rate(), RATE);
    assert_eq!(one.chunk_count(), 6);
    assert_eq!(two.sample_rate(), 8000);
    assert_eq!(two.chunk_count(), 8, "5 speech + 3 padding");

    // Nothing of either upload is left queued
    assert!(record_utterance(&mut source, &s).await.is_err());
    Ok(())
}
