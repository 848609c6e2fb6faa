//! Error Types for GSF
//!
//! This module defines all error types that can occur while encoding,
//! decoding or comparing grain sequences.
//!
//! ## Error Categories
//!
//! ### File Identification Errors
//! - `UnsupportedSignature`: File doesn't start with the "SSBB" magic
//! - `WrongFileType`: The SSB file-type tag is not "grsg"
//! - `UnsupportedMajorVersion`: The file was written by an incompatible
//!   major version of the format
//!
//! ### Structural Errors
//! - `TruncatedInput`: The stream ended before a declared block did
//! - `MalformedBlock`: A size field underflows the 8-byte block header, a
//!   child crosses its parent's end, a string isn't valid UTF-8, or a
//!   timestamp carries an out-of-range nanosecond field
//! - `TruncatedPayload`: A grain data block shorter than the grain declares
//!
//! ### Identifier Errors
//! - `DuplicateLocalId`: Two segment declarations share a local id
//! - `UnknownLocalId`: A grain names a segment that was never declared
//!
//! ### Encoder Errors
//! - `ValueOutOfRange`: A value cannot be represented on the wire
//! - `EncoderState`: A method was called in the wrong encoder phase
//!
//! ### Session Errors
//! - `DecoderBusy`: A lazy payload was requested while grain iteration was
//!   still in progress
//!
//! All fallible functions in the workspace return `Result<T>`, aliased to
//! `Result<T, Error>`, so `?` propagation works throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file does not carry the SSBB signature")]
    UnsupportedSignature,

    #[error("SSB file type {found:?} is not a grain sequence")]
    WrongFileType { found: String },

    #[error("unsupported GSF version {major}.{minor}")]
    UnsupportedMajorVersion { major: u16, minor: u16 },

    #[error("unexpected end of stream")]
    TruncatedInput,

    #[error("malformed block at offset {offset}: {reason}")]
    MalformedBlock { reason: String, offset: u64 },

    #[error("segment local id {0} declared more than once")]
    DuplicateLocalId(u16),

    #[error("grain references undeclared segment local id {0}")]
    UnknownLocalId(u16),

    #[error("grain data truncated: expected {expected} bytes, block holds {actual}")]
    TruncatedPayload { expected: u64, actual: u64 },

    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("encoder state error: {0}")]
    EncoderState(String),

    #[error("decoder is still iterating grains; lazy data is unavailable until iteration ends")]
    DecoderBusy,
}

impl Error {
    /// Shorthand for a malformed block error at a known stream offset.
    pub fn malformed(reason: impl Into<String>, offset: u64) -> Self {
        Error::MalformedBlock {
            reason: reason.into(),
            offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
