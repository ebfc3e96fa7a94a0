// Integration tests for the recording controller
//
// These drive the state machine through a test audio source whose frame
// channel the test feeds directly, and a scripted recognizer, so every
// scenario is deterministic without an input device.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

use voicenote::{
    AudioFile, AudioFormat, AudioFrame, AudioSource, CaptureError, ControllerConfig,
    MemoryTranscriptStore, NullRecognizer, Recognizer, RecorderError, RecorderState,
    RecordingController, ScriptItem, ScriptedRecognizer, TimedPlayer, TranscriptStore,
};

/// Audio source whose frame channel is fed by the test.
///
/// `start` creates a fresh channel and parks the sender where the test can
/// take it; dropping the taken sender ends the frame stream the way a
/// stopped capture engine would.
struct TapSource {
    format: AudioFormat,
    tap: Arc<StdMutex<Option<mpsc::Sender<AudioFrame>>>>,
    starts: Arc<AtomicUsize>,
}

impl TapSource {
    fn new() -> (Self, Arc<StdMutex<Option<mpsc::Sender<AudioFrame>>>>, Arc<AtomicUsize>) {
        let tap = Arc::new(StdMutex::new(None));
        let starts = Arc::new(AtomicUsize::new(0));
        (
            Self {
                format: AudioFormat::default(),
                tap: Arc::clone(&tap),
                starts: Arc::clone(&starts),
            },
            tap,
            starts,
        )
    }
}

#[async_trait]
impl AudioSource for TapSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        *self.tap.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&mut self) {
        self.tap.lock().unwrap().take();
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn name(&self) -> &str {
        "tap"
    }
}

/// Source that always fails to start.
struct BrokenSource;

#[async_trait]
impl AudioSource for BrokenSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        Err(CaptureError::StartFailed("engine refused".into()))
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&mut self) {}

    fn format(&self) -> AudioFormat {
        AudioFormat::default()
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn test_config(dir: &TempDir) -> ControllerConfig {
    ControllerConfig {
        recordings_dir: dir.path().to_path_buf(),
        locale: "en-US".to_string(),
        transcript_throttle: Duration::from_millis(500),
        timer_period: Duration::from_millis(50),
    }
}

fn test_frame(index: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![index as i16; 1600],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms: index * 100,
    }
}

fn wav_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    voicenote::list_recordings(dir.path()).unwrap()
}

#[tokio::test]
async fn invalid_commands_do_not_alter_state() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, _tap, _starts) = TapSource::new();
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    assert!(matches!(
        controller.pause().await,
        Err(RecorderError::InvalidState { .. })
    ));
    assert!(matches!(
        controller.resume().await,
        Err(RecorderError::InvalidState { .. })
    ));
    assert!(matches!(
        controller.play().await,
        Err(RecorderError::PlaybackFailed(_))
    ));
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    // Stop while idle is an idempotent no-op.
    assert!(controller.stop().await?.is_none());
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    controller.start().await?;
    assert!(matches!(
        controller.start().await,
        Err(RecorderError::InvalidState { .. })
    ));
    assert_eq!(controller.snapshot().state, RecorderState::Recording);

    controller.stop().await?;
    Ok(())
}

#[tokio::test]
async fn three_frames_round_trip_through_the_file() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let store = Arc::new(MemoryTranscriptStore::new());
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::clone(&store) as Arc<dyn TranscriptStore>,
    );

    controller.start().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Recording);

    let tx = tap.lock().unwrap().take().expect("tap registered");
    for i in 0..3u64 {
        tx.send(test_frame(i)).await?;
    }
    drop(tx); // capture engine stops delivering

    let artifact = controller.stop().await?.expect("artifact emitted");

    assert_eq!(controller.snapshot().state, RecorderState::Idle);
    assert_eq!(controller.snapshot().elapsed_seconds, 0);

    // Exactly one artifact reached the store.
    assert_eq!(store.saved().len(), 1);
    assert_eq!(store.saved()[0].id, artifact.id);

    // The file holds all three frames' samples in delivery order.
    let audio = AudioFile::open(&artifact.path)?;
    assert_eq!(audio.samples.len(), 3 * 1600);
    assert_eq!(audio.samples[0], 0);
    assert_eq!(audio.samples[1600], 1);
    assert_eq!(audio.samples[3200], 2);

    Ok(())
}

#[tokio::test]
async fn stop_twice_emits_at_most_one_artifact() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let store = Arc::new(MemoryTranscriptStore::new());
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::clone(&store) as Arc<dyn TranscriptStore>,
    );

    controller.start().await?;
    drop(tap.lock().unwrap().take());

    assert!(controller.stop().await?.is_some());
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    assert!(controller.stop().await?.is_none());
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    assert_eq!(store.saved().len(), 1);
    Ok(())
}

#[tokio::test]
async fn pause_resume_keeps_one_session_and_one_file() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, starts) = TapSource::new();
    let recognizer = Arc::new(ScriptedRecognizer::new(vec![]).with_final_text("done"));
    let store = Arc::new(MemoryTranscriptStore::new());
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::clone(&recognizer) as Arc<dyn Recognizer>,
        Arc::new(TimedPlayer),
        Arc::clone(&store) as Arc<dyn TranscriptStore>,
    );

    controller.start().await?;
    controller.pause().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Paused);

    controller.resume().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Recording);

    drop(tap.lock().unwrap().take());
    controller.stop().await?;

    // One capture start, one recognition session, one file, one artifact.
    assert_eq!(starts.load(Ordering::SeqCst), 1);
    assert_eq!(recognizer.sessions_opened(), 1);
    assert_eq!(wav_files(&dir).len(), 1);
    assert_eq!(store.saved().len(), 1);

    Ok(())
}

#[tokio::test]
async fn elapsed_counts_only_while_recording() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let controller = RecordingController::new(
        test_config(&dir), // 50ms ticks
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(400)).await;
    let while_recording = controller.snapshot().elapsed_seconds;
    assert!(while_recording >= 1, "elapsed should advance while recording");

    controller.pause().await?;
    let at_pause = controller.snapshot().elapsed_seconds;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        controller.snapshot().elapsed_seconds,
        at_pause,
        "elapsed must not advance while paused"
    );

    controller.resume().await?;
    drop(tap.lock().unwrap().take());
    controller.stop().await?;
    assert_eq!(controller.snapshot().elapsed_seconds, 0);

    Ok(())
}

#[tokio::test]
async fn transcript_updates_are_throttled_and_monotonic() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let recognizer = Arc::new(ScriptedRecognizer::new(vec![
        ScriptItem::update(0, "A"),
        ScriptItem::update(200, "B"),
        ScriptItem::update(200, "C"),
        ScriptItem::update(200, "D"),
    ]));
    let controller = RecordingController::new(
        test_config(&dir), // 500ms throttle window
        Box::new(source),
        Arc::clone(&recognizer) as Arc<dyn Recognizer>,
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    let mut snapshots = controller.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while snapshots.changed().await.is_ok() {
            let transcript = snapshots.borrow().transcript.clone();
            if seen.last() != Some(&transcript) {
                seen.push(transcript);
            }
        }
        seen
    });

    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(900)).await;
    drop(tap.lock().unwrap().take());
    let artifact = controller.stop().await?.expect("artifact emitted");
    drop(controller);

    let published = collector.await?;
    let transcripts: Vec<&str> = published
        .iter()
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .collect();

    // A publishes immediately; B and C fall inside the 500ms window and are
    // discarded; D is the next accepted update.
    assert!(transcripts.contains(&"A"), "published: {:?}", transcripts);
    assert!(transcripts.contains(&"D"), "published: {:?}", transcripts);
    assert!(!transcripts.contains(&"B"), "published: {:?}", transcripts);
    assert!(!transcripts.contains(&"C"), "published: {:?}", transcripts);

    // Publications never regress.
    let a_pos = transcripts.iter().position(|&s| s == "A").unwrap();
    let d_pos = transcripts.iter().position(|&s| s == "D").unwrap();
    assert!(a_pos < d_pos);

    assert_eq!(artifact.transcript, "D");
    Ok(())
}

#[tokio::test]
async fn buffered_frames_reach_the_recognizer_before_end_of_audio() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let recognizer = Arc::new(ScriptedRecognizer::new(vec![]).with_final_text("done"));
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::clone(&recognizer) as Arc<dyn Recognizer>,
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    controller.start().await?;

    // Stop immediately after enqueueing, while frames may still sit in the
    // capture channel; teardown must drain them into the session before it
    // asks for the final result.
    let tx = tap.lock().unwrap().take().expect("tap registered");
    for i in 0..5u64 {
        tx.send(test_frame(i)).await?;
    }
    drop(tx);
    controller.stop().await?;

    assert_eq!(recognizer.frames_seen(), 5);
    assert_eq!(
        recognizer.appends_after_finish(),
        0,
        "no audio may follow the end-of-audio signal"
    );

    Ok(())
}

#[tokio::test]
async fn unavailable_recognizer_records_file_only() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let store = Arc::new(MemoryTranscriptStore::new());
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(ScriptedRecognizer::unavailable()),
        Arc::new(TimedPlayer),
        Arc::clone(&store) as Arc<dyn TranscriptStore>,
    );
    let mut errors = controller.take_errors().expect("error channel");

    controller.start().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Recording);

    assert!(matches!(
        errors.recv().await,
        Some(RecorderError::RecognizerUnavailable(_))
    ));

    let tx = tap.lock().unwrap().take().expect("tap registered");
    tx.send(test_frame(0)).await?;
    drop(tx);

    let artifact = controller.stop().await?.expect("artifact emitted");
    assert!(artifact.transcript.is_empty());
    assert!(artifact.path.exists());

    Ok(())
}

#[tokio::test]
async fn recognition_error_does_not_kill_capture() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let recognizer = Arc::new(ScriptedRecognizer::new(vec![
        ScriptItem::update(0, "hello"),
        ScriptItem::error(100, "engine crashed"),
    ]));
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        recognizer,
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );
    let mut errors = controller.take_errors().expect("error channel");

    controller.start().await?;
    let tx = tap.lock().unwrap().take().expect("tap registered");
    tx.send(test_frame(0)).await?;

    // Wait for the scripted failure to land.
    assert!(matches!(
        tokio::time::timeout(Duration::from_secs(2), errors.recv()).await?,
        Some(RecorderError::RecognitionError(_))
    ));

    // Capture keeps running after the recognizer died.
    assert_eq!(controller.snapshot().state, RecorderState::Recording);
    tx.send(test_frame(1)).await?;
    tx.send(test_frame(2)).await?;
    drop(tx);

    let artifact = controller.stop().await?.expect("artifact emitted");
    assert_eq!(artifact.transcript, "hello");

    let audio = AudioFile::open(&artifact.path)?;
    assert_eq!(audio.samples.len(), 3 * 1600);

    Ok(())
}

#[tokio::test]
async fn failed_capture_start_leaves_idle_and_no_file() -> Result<()> {
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryTranscriptStore::new());
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(BrokenSource),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::clone(&store) as Arc<dyn TranscriptStore>,
    );

    assert!(matches!(
        controller.start().await,
        Err(RecorderError::CaptureStartFailed(_))
    ));
    assert_eq!(controller.snapshot().state, RecorderState::Idle);
    assert!(wav_files(&dir).is_empty(), "no partial file may remain");
    assert!(store.saved().is_empty());

    Ok(())
}

#[tokio::test]
async fn playback_completion_returns_to_idle() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    // Record a short clip first.
    controller.start().await?;
    let tx = tap.lock().unwrap().take().expect("tap registered");
    tx.send(test_frame(0)).await?; // 100ms of audio
    drop(tx);
    controller.stop().await?;

    controller.play().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Playing);

    // Elapsed never advances during playback.
    let elapsed = controller.snapshot().elapsed_seconds;
    assert_eq!(elapsed, 0);

    // TimedPlayer sleeps the 100ms duration, then completion forces idle.
    let mut snapshots = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            snapshots.changed().await.unwrap();
            if snapshots.borrow().state == RecorderState::Idle {
                break;
            }
        }
    })
    .await?;

    Ok(())
}

#[tokio::test]
async fn stop_playback_is_immediate_and_idempotent() -> Result<()> {
    let dir = TempDir::new()?;
    let (source, tap, _starts) = TapSource::new();
    let controller = RecordingController::new(
        test_config(&dir),
        Box::new(source),
        Arc::new(NullRecognizer),
        Arc::new(TimedPlayer),
        Arc::new(MemoryTranscriptStore::new()),
    );

    controller.start().await?;
    let tx = tap.lock().unwrap().take().expect("tap registered");
    for i in 0..20u64 {
        tx.send(test_frame(i)).await?; // 2s of audio
    }
    drop(tx);
    controller.stop().await?;

    controller.play().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Playing);

    controller.stop_playback().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    // Stopping again is a no-op.
    controller.stop_playback().await?;
    assert_eq!(controller.snapshot().state, RecorderState::Idle);

    Ok(())
}
