//! The Grain Data Model
//!
//! A grain is a self-contained unit of media: one video frame, a chunk of
//! audio samples, a coded access unit, an event, or an empty placeholder.
//! Every grain carries:
//!
//! - a [`GrainHeader`] common to all kinds (identity, timing, cadence,
//!   time labels),
//! - exactly one [`GrainPayload`] variant describing the payload shape,
//! - a [`GrainData`] region holding (or pointing at) the payload bytes.
//!
//! ## Why a sum type?
//!
//! The payload variants share no fields, and the set is closed. A single
//! enum keeps exhaustive matching honest in the codec and the comparator,
//! and the discriminant is simply which variant is present.
//!
//! ## Data regions
//!
//! Payload bytes are either materialized (`Bytes`, cheap to clone) or a
//! lazy `(offset, length)` handle into the stream a decoder read the grain
//! from. Lazy handles are resolved through the decode session that produced
//! them; see the codec crate for the gating rules.

use crate::enums::{CogAudioFormat, CogFrameFormat, CogFrameLayout};
use crate::rational::Rational;
use crate::time::{GrainTimestamp, TimeLabel};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The grain discriminant, as carried by which payload variant is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrainType {
    Empty,
    Video,
    CodedVideo,
    Audio,
    CodedAudio,
    Event,
}

impl fmt::Display for GrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GrainType::Empty => "empty",
            GrainType::Video => "video",
            GrainType::CodedVideo => "coded_video",
            GrainType::Audio => "audio",
            GrainType::CodedAudio => "coded_audio",
            GrainType::Event => "event",
        };
        f.write_str(name)
    }
}

/// Fields common to every grain kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrainHeader {
    /// Identity of the source that produced the media.
    pub source_id: Uuid,
    /// Identity of the flow this grain belongs to.
    pub flow_id: Uuid,
    /// Media time of the grain content.
    pub origin_timestamp: GrainTimestamp,
    /// Synchronisation time; usually equals the origin timestamp.
    pub sync_timestamp: GrainTimestamp,
    /// Wall-clock time the grain was created. Not stored on the wire.
    pub creation_timestamp: GrainTimestamp,
    /// Grain cadence.
    pub rate: Rational,
    /// Grain duration.
    pub duration: Rational,
    /// Ordered, possibly empty, list of named timecodes.
    pub timelabels: Vec<TimeLabel>,
}

impl GrainHeader {
    pub fn new(source_id: Uuid, flow_id: Uuid, origin_timestamp: GrainTimestamp) -> Self {
        Self {
            source_id,
            flow_id,
            origin_timestamp,
            sync_timestamp: origin_timestamp,
            creation_timestamp: GrainTimestamp::zero(),
            rate: Rational::new(25, 1),
            duration: Rational::new(1, 25),
            timelabels: Vec::new(),
        }
    }
}

/// One plane of an uncompressed video payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoComponent {
    pub width: u32,
    pub height: u32,
    /// Bytes between the starts of consecutive rows.
    pub stride: u32,
    /// Total bytes occupied by this component in the data region.
    pub length: u32,
}

/// Payload description for uncompressed video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoHeader {
    pub format: CogFrameFormat,
    pub layout: CogFrameLayout,
    pub width: u32,
    pub height: u32,
    pub extension: u32,
    pub aspect_ratio: Rational,
    pub pixel_aspect_ratio: Rational,
    pub components: Vec<VideoComponent>,
}

impl VideoHeader {
    /// Builds a header with components derived from the planar geometry of
    /// `format`. Non-planar formats get a single component covering the
    /// whole payload.
    pub fn with_planar_components(
        format: CogFrameFormat,
        layout: CogFrameLayout,
        width: u32,
        height: u32,
    ) -> Self {
        let mut header = Self {
            format,
            layout,
            width,
            height,
            extension: 0,
            aspect_ratio: Rational::null(),
            pixel_aspect_ratio: Rational::new(1, 1),
            components: Vec::new(),
        };

        if format.is_planar() {
            let bpv = format.bytes_per_value();
            let luma_stride = width * bpv;
            header.components.push(VideoComponent {
                width,
                height,
                stride: luma_stride,
                length: luma_stride * height,
            });
            let (cw, ch) = if format.is_planar_rgb() {
                (width, height)
            } else {
                (width >> format.h_shift(), height >> format.v_shift())
            };
            let chroma_stride = cw * bpv;
            for _ in 0..2 {
                header.components.push(VideoComponent {
                    width: cw,
                    height: ch,
                    stride: chroma_stride,
                    length: chroma_stride * ch,
                });
            }
        }

        header
    }

    /// Byte offset of each component, recomputed from the lengths so that
    /// edits to a component length are reflected downstream.
    pub fn component_offsets(&self) -> Vec<u64> {
        let mut offsets = Vec::with_capacity(self.components.len());
        let mut offset = 0u64;
        for comp in &self.components {
            offsets.push(offset);
            offset += comp.length as u64;
        }
        offsets
    }

    /// Sum of the component lengths.
    pub fn total_length(&self) -> u64 {
        self.components.iter().map(|c| c.length as u64).sum()
    }
}

/// Payload description for coded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedVideoHeader {
    pub format: CogFrameFormat,
    pub layout: CogFrameLayout,
    pub origin_width: u32,
    pub origin_height: u32,
    pub coded_width: u32,
    pub coded_height: u32,
    pub key_frame: bool,
    pub temporal_offset: i32,
    /// Byte offsets of coded units within the payload; possibly empty.
    pub unit_offsets: Vec<u32>,
}

/// Payload description for uncompressed audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioHeader {
    pub format: CogAudioFormat,
    pub channels: u16,
    pub samples: u32,
    pub sample_rate: u32,
}

impl AudioHeader {
    /// Expected payload size implied by the format geometry. The codec
    /// never recomputes this; it is a convenience for producers.
    pub fn expected_length(&self) -> u64 {
        self.format.bytes_per_sample() as u64 * self.channels as u64 * self.samples as u64
    }
}

/// Payload description for coded audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodedAudioHeader {
    pub format: CogAudioFormat,
    pub channels: u16,
    pub samples: u32,
    pub priming: u32,
    pub remainder: u32,
    pub sample_rate: u32,
}

/// Payload description for event grains. Type 0 is JSON by convention; the
/// payload bytes are opaque to the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    pub event_type: u8,
}

/// The variant-specific half of a grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrainPayload {
    Empty,
    Video(VideoHeader),
    CodedVideo(CodedVideoHeader),
    Audio(AudioHeader),
    CodedAudio(CodedAudioHeader),
    Event(EventHeader),
}

impl GrainPayload {
    pub fn grain_type(&self) -> GrainType {
        match self {
            GrainPayload::Empty => GrainType::Empty,
            GrainPayload::Video(_) => GrainType::Video,
            GrainPayload::CodedVideo(_) => GrainType::CodedVideo,
            GrainPayload::Audio(_) => GrainType::Audio,
            GrainPayload::CodedAudio(_) => GrainType::CodedAudio,
            GrainPayload::Event(_) => GrainType::Event,
        }
    }
}

/// A deferred read of a grain payload: a byte range in the stream the grain
/// was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyData {
    pub offset: u64,
    pub length: u64,
}

/// The data region of a grain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GrainData {
    /// Payload bytes held in memory.
    Materialized(Bytes),
    /// A handle to payload bytes still sitting in the decode source.
    Lazy(LazyData),
}

impl GrainData {
    pub fn empty() -> Self {
        GrainData::Materialized(Bytes::new())
    }

    pub fn len(&self) -> u64 {
        match self {
            GrainData::Materialized(bytes) => bytes.len() as u64,
            GrainData::Lazy(lazy) => lazy.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload bytes, if materialized.
    pub fn bytes(&self) -> Option<&Bytes> {
        match self {
            GrainData::Materialized(bytes) => Some(bytes),
            GrainData::Lazy(_) => None,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, GrainData::Lazy(_))
    }
}

/// A single grain: common header, payload variant, data region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grain {
    pub header: GrainHeader,
    pub payload: GrainPayload,
    pub data: GrainData,
}

impl Grain {
    pub fn new(header: GrainHeader, payload: GrainPayload, data: GrainData) -> Self {
        Self {
            header,
            payload,
            data,
        }
    }

    /// An empty grain with a zero-length data region.
    pub fn empty(source_id: Uuid, flow_id: Uuid, origin: GrainTimestamp) -> Self {
        Self::new(
            GrainHeader::new(source_id, flow_id, origin),
            GrainPayload::Empty,
            GrainData::empty(),
        )
    }

    /// An uncompressed video grain with planar components and a zeroed data
    /// region of the expected size.
    pub fn video(
        source_id: Uuid,
        flow_id: Uuid,
        origin: GrainTimestamp,
        format: CogFrameFormat,
        layout: CogFrameLayout,
        width: u32,
        height: u32,
    ) -> Self {
        let video = VideoHeader::with_planar_components(format, layout, width, height);
        let data = GrainData::Materialized(Bytes::from(vec![0u8; video.total_length() as usize]));
        Self::new(
            GrainHeader::new(source_id, flow_id, origin),
            GrainPayload::Video(video),
            data,
        )
    }

    /// An uncompressed audio grain with a zeroed data region of the
    /// expected size.
    pub fn audio(
        source_id: Uuid,
        flow_id: Uuid,
        origin: GrainTimestamp,
        format: CogAudioFormat,
        channels: u16,
        samples: u32,
        sample_rate: u32,
    ) -> Self {
        let audio = AudioHeader {
            format,
            channels,
            samples,
            sample_rate,
        };
        let data = GrainData::Materialized(Bytes::from(vec![0u8; audio.expected_length() as usize]));
        Self::new(
            GrainHeader::new(source_id, flow_id, origin),
            GrainPayload::Audio(audio),
            data,
        )
    }

    /// An event grain wrapping an opaque payload.
    pub fn event(
        source_id: Uuid,
        flow_id: Uuid,
        origin: GrainTimestamp,
        event_type: u8,
        payload: Bytes,
    ) -> Self {
        Self::new(
            GrainHeader::new(source_id, flow_id, origin),
            GrainPayload::Event(EventHeader { event_type }),
            GrainData::Materialized(payload),
        )
    }

    pub fn grain_type(&self) -> GrainType {
        self.payload.grain_type()
    }

    /// Length of the data region in bytes.
    pub fn length(&self) -> u64 {
        self.data.len()
    }

    /// The payload length the metadata declares, where the variant implies
    /// one. Video declares the sum of its component lengths; an empty grain
    /// declares zero; for the remaining kinds the data region itself is
    /// authoritative.
    pub fn expected_data_length(&self) -> Option<u64> {
        match &self.payload {
            GrainPayload::Empty => Some(0),
            GrainPayload::Video(video) => Some(video.total_length()),
            _ => None,
        }
    }

    /// Replaces the data region with materialized bytes.
    pub fn set_data(&mut self, data: Bytes) {
        self.data = GrainData::Materialized(data);
    }
}
