pub mod backend;
pub mod file;
pub mod pcm;
pub mod wav;

pub use backend::{
    CaptureConfig, CaptureDevice, CaptureHandle, DeviceLease, PlaybackSink, SharedCaptureDevice,
};
pub use file::AudioFile;
pub use pcm::PcmBuffer;
pub use wav::{decode, encode, encode_samples, WavBytes};
