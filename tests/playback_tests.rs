// Integration tests for playback completion semantics.
//
// Uses TimedPlayer, which decodes the WAV for its duration but produces no
// sound, so the tests run headless.

use anyhow::Result;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use voicenote::{Player, RecorderError, TimedPlayer};

/// Write a short mono 16kHz WAV and return its path.
fn write_test_wav(dir: &TempDir, name: &str, millis: u64) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for _ in 0..(16 * millis) {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(path)
}

#[tokio::test]
async fn finished_fires_after_natural_end() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_test_wav(&dir, "short.wav", 100)?;

    let mut handle = TimedPlayer.play(&path).map_err(anyhow::Error::from)?;
    let finished = handle.take_finished().expect("finished receiver");

    let began = Instant::now();
    tokio::time::timeout(Duration::from_secs(2), finished).await??;
    assert!(began.elapsed() >= Duration::from_millis(90));

    // The receiver is single-shot.
    assert!(handle.take_finished().is_none());
    Ok(())
}

#[tokio::test]
async fn stop_fires_finished_early() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_test_wav(&dir, "long.wav", 5000)?;

    let mut handle = TimedPlayer.play(&path).map_err(anyhow::Error::from)?;
    let finished = handle.take_finished().expect("finished receiver");

    handle.stop();

    let began = Instant::now();
    tokio::time::timeout(Duration::from_secs(2), finished).await??;
    assert!(
        began.elapsed() < Duration::from_secs(1),
        "stop should end playback well before the 5s natural end"
    );

    Ok(())
}

#[tokio::test]
async fn playing_a_missing_file_fails() {
    let result = TimedPlayer.play(&PathBuf::from("/nonexistent/recording.wav"));
    assert!(matches!(result, Err(RecorderError::PlaybackFailed(_))));
}
