use serde::{Deserialize, Serialize};

/// Audio format negotiated with the capture hardware at session start.
///
/// Fixed for the lifetime of a session: the WAV header is written from this
/// and the recognizer session is opened against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Bits per sample (16 for i16 PCM)
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    /// Number of interleaved samples covering `ms` milliseconds.
    pub fn samples_for_ms(&self, ms: u64) -> usize {
        (self.sample_rate as u64 * self.channels as u64 * ms / 1000) as usize
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration of this frame in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sample_count_for_duration() {
        let format = AudioFormat::default();
        assert_eq!(format.samples_for_ms(100), 1600);

        let stereo = AudioFormat {
            sample_rate: 48000,
            channels: 2,
            bits_per_sample: 16,
        };
        assert_eq!(stereo.samples_for_ms(100), 9600);
    }

    #[test]
    fn frame_duration_from_samples() {
        let frame = AudioFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: 0,
        };
        assert_eq!(frame.duration_ms(), 100);
    }
}
