use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::frame::{AudioFormat, AudioFrame};
use crate::error::RecorderError;

/// Summary returned when a recording file is finalized.
#[derive(Debug, Clone, Copy)]
pub struct WriterReport {
    /// Interleaved samples written to the file
    pub samples_written: u64,
    /// Frames that failed to write (logged, session continued)
    pub failed_frames: u64,
}

/// Append-only WAV writer for the durable capture path.
///
/// `create` opens the file and spawns a blocking write task that owns the
/// hound writer; frames are handed off through an unbounded ordered queue so
/// a slow disk never delays the audio producer. Every enqueued frame is
/// written in delivery order; a failed write is logged and surfaced on the
/// error channel but does not stop the session.
pub struct RecordingWriter {
    tx: Option<mpsc::UnboundedSender<AudioFrame>>,
    task: Option<JoinHandle<WriterReport>>,
    path: PathBuf,
}

impl RecordingWriter {
    /// Open a WAV file for the given format and start the write task.
    pub fn create(
        path: PathBuf,
        format: AudioFormat,
        error_tx: mpsc::UnboundedSender<RecorderError>,
    ) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        let (tx, rx) = mpsc::unbounded_channel::<AudioFrame>();
        let task =
            tokio::task::spawn_blocking(move || write_loop(Box::new(writer), rx, error_tx));

        info!("Recording file opened: {:?}", path);

        Ok(Self {
            tx: Some(tx),
            task: Some(task),
            path,
        })
    }

    /// Sender used to enqueue frames from the fan-out task. Enqueueing is
    /// non-blocking; order is preserved.
    pub fn sender(&self) -> mpsc::UnboundedSender<AudioFrame> {
        self.tx
            .as_ref()
            .expect("writer sender taken after finish")
            .clone()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Flush and close the file. Idempotent: a second call reports zero
    /// samples. All senders must be dropped for the queue to drain fully,
    /// which the controller guarantees by joining the fan-out task first.
    pub async fn finish(&mut self) -> Result<WriterReport> {
        self.tx.take();

        let report = match self.task.take() {
            Some(task) => task.await.context("Writer task panicked")?,
            None => WriterReport {
                samples_written: 0,
                failed_frames: 0,
            },
        };

        info!(
            "Recording file finalized: {:?} ({} samples, {} failed frames)",
            self.path, report.samples_written, report.failed_frames
        );

        Ok(report)
    }

    /// Close the writer and remove the partial file. Used when a session
    /// fails to start and must leave no artifact behind.
    pub async fn abort(&mut self) {
        self.tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove partial recording {:?}: {}", self.path, e);
        }
    }
}

/// Destination for PCM samples. The production sink is a hound writer; the
/// seam exists so failure handling in the loop can be tested.
trait SampleSink: Send {
    fn write_sample(&mut self, sample: i16) -> hound::Result<()>;
    fn finalize(self: Box<Self>) -> hound::Result<()>;
}

impl SampleSink for hound::WavWriter<BufWriter<File>> {
    fn write_sample(&mut self, sample: i16) -> hound::Result<()> {
        hound::WavWriter::write_sample(self, sample)
    }

    fn finalize(self: Box<Self>) -> hound::Result<()> {
        hound::WavWriter::finalize(*self)
    }
}

fn write_loop(
    mut sink: Box<dyn SampleSink>,
    mut rx: mpsc::UnboundedReceiver<AudioFrame>,
    error_tx: mpsc::UnboundedSender<RecorderError>,
) -> WriterReport {
    let mut samples_written = 0u64;
    let mut failed_frames = 0u64;

    while let Some(frame) = rx.blocking_recv() {
        let mut frame_failed = false;
        for &sample in &frame.samples {
            if let Err(e) = sink.write_sample(sample) {
                error!("Audio write failed: {}", e);
                let _ = error_tx.send(RecorderError::WriteFailed(e.to_string()));
                frame_failed = true;
                break;
            }
            samples_written += 1;
        }
        if frame_failed {
            failed_frames += 1;
        }
    }

    if let Err(e) = sink.finalize() {
        error!("Failed to finalize WAV file: {}", e);
        let _ = error_tx.send(RecorderError::WriteFailed(e.to_string()));
    }

    WriterReport {
        samples_written,
        failed_frames,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink that starts failing after a fixed number of samples.
    struct FlakySink {
        written: u64,
        fail_after: u64,
    }

    impl SampleSink for FlakySink {
        fn write_sample(&mut self, _sample: i16) -> hound::Result<()> {
            if self.written >= self.fail_after {
                return Err(hound::Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "device out of space",
                )));
            }
            self.written += 1;
            Ok(())
        }

        fn finalize(self: Box<Self>) -> hound::Result<()> {
            Ok(())
        }
    }

    fn frame(samples: usize) -> AudioFrame {
        AudioFrame {
            samples: vec![1i16; samples],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        }
    }

    #[tokio::test]
    async fn failed_append_is_surfaced_and_the_loop_keeps_draining() {
        let (error_tx, mut error_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::unbounded_channel();

        // First frame fits; the next two hit the failure and are counted,
        // not fatal.
        let sink = Box::new(FlakySink {
            written: 0,
            fail_after: 160,
        });
        let task = tokio::task::spawn_blocking(move || write_loop(sink, rx, error_tx));

        for _ in 0..3 {
            tx.send(frame(160)).unwrap();
        }
        drop(tx);

        let report = task.await.unwrap();
        assert_eq!(report.samples_written, 160);
        assert_eq!(report.failed_frames, 2);

        assert!(matches!(
            error_rx.try_recv(),
            Ok(RecorderError::WriteFailed(_))
        ));
    }
}
