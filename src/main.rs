use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use voicenote::{
    create_router, AppState, AudioFormat, AudioSource, Config, JsonTranscriptStore, MicSource,
    NullRecognizer, Player, RecordingController, RodioPlayer, ScriptItem, ScriptedRecognizer,
    ToneSource,
};

#[derive(Parser)]
#[command(name = "voicenote", about = "Voice memo capture with live transcription")]
struct Cli {
    /// Path to a config file (without extension), e.g. config/voicenote
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP command surface against the default microphone
    Serve,
    /// Record a synthetic tone for a few seconds (no microphone needed)
    Record {
        /// Recording length in seconds
        #[arg(long, default_value_t = 3)]
        seconds: u64,
    },
    /// List completed recordings, newest first
    List,
    /// Play a recording file to the default output device
    Play { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Record { seconds } => record_demo(config, seconds).await,
        Command::List => list(config),
        Command::Play { file } => play(&file).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    let recordings_dir = config.recordings_dir();

    let source: Box<dyn AudioSource> = match MicSource::new() {
        Ok(mic) => {
            info!("Using input device: {}", mic.name());
            Box::new(mic)
        }
        Err(e) => {
            warn!("No usable input device ({}), falling back to tone source", e);
            Box::new(ToneSource::new(AudioFormat::default(), 440.0))
        }
    };

    let controller = Arc::new(RecordingController::new(
        config.controller_config(),
        source,
        Arc::new(NullRecognizer),
        Arc::new(RodioPlayer),
        Arc::new(JsonTranscriptStore::new(&recordings_dir)),
    ));

    let app = create_router(AppState::new(controller, recordings_dir));

    let addr = format!("{}:{}", config.http.bind, config.http.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

async fn record_demo(config: Config, seconds: u64) -> Result<()> {
    let recordings_dir = config.recordings_dir();

    let recognizer = Arc::new(
        ScriptedRecognizer::new(vec![
            ScriptItem::update(600, "testing"),
            ScriptItem::update(700, "testing one two"),
        ])
        .with_final_text("testing one two three"),
    );

    let controller = RecordingController::new(
        config.controller_config(),
        Box::new(ToneSource::new(AudioFormat::default(), 440.0)),
        recognizer,
        Arc::new(RodioPlayer),
        Arc::new(JsonTranscriptStore::new(&recordings_dir)),
    );

    controller.start().await?;
    info!("Recording {}s of tone...", seconds);
    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;

    let artifact = controller
        .stop()
        .await?
        .context("Recording produced no artifact")?;

    println!("Saved {:?}", artifact.path);
    println!("Transcript: {}", artifact.transcript);

    Ok(())
}

fn list(config: Config) -> Result<()> {
    let recordings = voicenote::list_recordings(&config.recordings_dir())?;
    if recordings.is_empty() {
        println!("No recordings yet");
        return Ok(());
    }
    for path in recordings {
        println!("{}", path.display());
    }
    Ok(())
}

async fn play(file: &PathBuf) -> Result<()> {
    let player = RodioPlayer;
    let mut handle = player
        .play(file)
        .map_err(|e| anyhow::anyhow!("Playback failed: {}", e))?;

    if let Some(finished) = handle.take_finished() {
        let _ = finished.await;
    }
    info!("Playback finished");

    Ok(())
}
