//! Command implementations shared by the binaries.

mod extract;
mod probe;
mod wrap;

pub use extract::extract_essence;
pub use probe::{probe, ProbeReport};
pub use wrap::{wrap_audio, wrap_video, WrapAudioConfig, WrapVideoConfig};
