pub mod file;
pub mod frame;
pub mod mic;
pub mod source;
pub mod writer;

pub use file::AudioFile;
pub use frame::{AudioFormat, AudioFrame};
pub use mic::MicSource;
pub use source::{AudioSource, CaptureError, ToneSource};
pub use writer::{RecordingWriter, WriterReport};
