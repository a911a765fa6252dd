// Integration tests for configuration loading

use anyhow::Result;
use lingo_voice::Config;
use std::time::Duration;
use tempfile::TempDir;

fn config_text(chunk_ms: u64, silence_ms: u64) -> String {
    format!(
        r#"
[service]
name = "lingo-voice-test"

[service.http]
bind = "127.0.0.1"
port = 8000
assets_dir = "assets"

[audio]
chunk_duration_ms = {chunk_ms}
silence_threshold = 800.0
silence_duration_ms = {silence_ms}
feed_capacity = 16

[services]
base_url = "http://localhost:9999/v1"
api_key = "test-key"
chat_model = "chat"
transcription_model = "whisper"
speech_model = "tts"
image_model = "image"
voice = "nova"
timeout_secs = 5
"#
    )
}

fn load(temp_dir: &TempDir, text: &str) -> Result<Config> {
    let path = temp_dir.path().join("lingo.toml");
    std::fs::write(&path, text)?;
    Config::load(&path.to_string_lossy())
}

#[test]
fn test_load_session_config() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let cfg = load(&temp_dir, &config_text(200, 4000))?;

    let session = cfg.session_config("s-1")?;
    assert_eq!(session.session_id, "s-1");
    assert_eq!(session.endpointing.chunk_duration, Duration::from_millis(200));
    assert_eq!(session.endpointing.silent_chunks_required(), 20);
    assert_eq!(session.endpointing.max_utterance_duration, None);
    assert!(session.open_with_greeting);
    Ok(())
}

#[test]
fn test_zero_durations_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;

    let cfg = load(&temp_dir, &config_text(0, 4000))?;
    let err = cfg.endpointing().unwrap_err();
    assert!(err.to_string().contains("chunk_duration_ms"));
    assert!(cfg.session_config("s-1").is_err());

    let cfg = load(&temp_dir, &config_text(200, 0))?;
    let err = cfg.endpointing().unwrap_err();
    assert!(err.to_string().contains("silence_duration_ms"));
    Ok(())
}
