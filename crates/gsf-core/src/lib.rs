//! Core data model for the Grain Sequence Format (GSF).
//!
//! This crate defines the types shared by the codec, the comparator and the
//! command-line tools:
//!
//! - The [`Grain`] sum type: a common header plus exactly one payload
//!   variant (empty, video, coded video, audio, coded audio, event) and an
//!   opaque data region.
//! - The wire-value types: [`GrainTimestamp`] (signed nanosecond
//!   timestamps), [`DateTime`] (wall-clock seconds), [`Rational`],
//!   [`TimeLabel`].
//! - The cog media enums: [`CogFrameFormat`], [`CogFrameLayout`],
//!   [`CogAudioFormat`], preserved losslessly for unknown numeric values.
//! - File-level metadata: [`FileHeader`] and [`SegmentInfo`].
//! - The [`Error`] taxonomy used across the workspace.
//!
//! The crate is deliberately free of any I/O. Serialisation to and from the
//! SSB block structure lives in `gsf-codec`.

pub mod enums;
pub mod error;
pub mod file;
pub mod grain;
pub mod rational;
pub mod time;

pub use enums::{CogAudioFormat, CogFrameFormat, CogFrameLayout};
pub use error::{Error, Result};
pub use file::{FileHeader, SegmentInfo};
pub use grain::{
    AudioHeader, CodedAudioHeader, CodedVideoHeader, EventHeader, Grain, GrainData, GrainHeader,
    GrainPayload, GrainType, LazyData, VideoComponent, VideoHeader,
};
pub use rational::Rational;
pub use time::{DateTime, GrainTimestamp, TimeLabel, Timecode};
