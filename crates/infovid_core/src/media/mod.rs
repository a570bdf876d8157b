//! FFmpeg-backed media operations.
//!
//! - Command building and execution (`ffmpeg`)
//! - Output probing (`probe`)
//! - Scratch directory lifetime (`scratch`)
//! - Still-to-video synthesis (`synthesizer`)

mod error;
mod ffmpeg;
mod probe;
mod scratch;
mod synthesizer;

pub use error::{MediaError, MediaResult};
pub use ffmpeg::FfmpegCommand;
pub use probe::{parse_probe_json, probe_media};
pub use scratch::ScratchDir;
pub use synthesizer::{
    concat_list, still_durations, SynthesisInput, SynthesisOutput, VideoSynthesizer,
};
