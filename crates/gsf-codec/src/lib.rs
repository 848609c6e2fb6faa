//! SSB Block Framing and the GSF Codec
//!
//! This crate implements the two layers that turn bytes into grains and
//! back:
//!
//! 1. The **Sequence Store Binary (SSB)** envelope: a chunked structure of
//!    `tag (4 ASCII bytes) + size (u32, including the 8-byte header)`
//!    blocks under a 12-byte file header. Readers skip unknown tags by
//!    exact payload length, never read past a declared block end, and treat
//!    `fill` blocks as padding everywhere.
//! 2. The **Grain Sequence Format (GSF)** grammar on top of it: one `head`
//!    block declaring segments and tags, a run of `grai` blocks each
//!    holding a grain header (`gbhd`) and a data region (`grdt`), and a
//!    size-zero `grai` terminator.
//!
//! ## File structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ File header (12 bytes)                                   │
//! │ - "SSBB" signature (4)                                   │
//! │ - file type "grsg" (4)                                   │
//! │ - major version u16, minor version u16                   │
//! ├──────────────────────────────────────────────────────────┤
//! │ "head" block                                             │
//! │ - file id (16), created (7)                              │
//! │ - "segm" child per segment (local id, id, count, tags)   │
//! │ - "tag " children for file-level tags                    │
//! ├──────────────────────────────────────────────────────────┤
//! │ "grai" block per grain                                   │
//! │ - local id (2)                                           │
//! │ - "gbhd" child: common header + one variant block        │
//! │ - "grdt" child: payload bytes                            │
//! ├──────────────────────────────────────────────────────────┤
//! │ "grai" terminator (size field 0)                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sync and async
//!
//! Both a blocking API ([`GsfDecoder`], [`GsfEncoder`]) and an async API
//! ([`aio::AsyncGsfDecoder`], [`aio::AsyncGsfEncoder`]) are provided. Block
//! payloads are read whole into [`bytes::Bytes`] and decoded by shared pure
//! parsers, so the two paths cannot drift apart.
//!
//! ## Reading lazily
//!
//! [`DecodeOptions::skip_data`] makes the decoder seek over `grdt` payloads
//! and hand out `(offset, length)` handles instead of bytes. Handles are
//! resolved through [`GsfDecoder::load_data`] once grain iteration has
//! finished; resolving earlier returns [`gsf_core::Error::DecoderBusy`].

pub mod aio;
pub mod decoder;
pub mod encoder;
pub mod ssb;

pub use decoder::{DecodeOptions, GsfDecoder, GrainIter};
pub use encoder::GsfEncoder;
pub use ssb::{BlockHeader, BlockReader, BlockWriter, GsfSink, SeekableSink, StreamSink};

// The error type is shared across the whole workspace.
pub use gsf_core::{Error, Result};
