//! SSB envelope: constants, block framing, wire codecs.
//!
//! Blocks are framed as a 4-byte ASCII tag followed by a u32 size that
//! counts the 8-byte header itself. All multi-byte integers in the format
//! are little-endian.

mod read;
mod write;
pub(crate) mod wire;

pub use read::{BlockHeader, BlockReader};
pub use write::{BlockWriter, GsfSink, SeekableSink, StreamSink};

pub(crate) use read::require_gsf_file_type;

/// File signature at offset 0: "SSBB".
pub const SSB_SIGNATURE: [u8; 4] = *b"SSBB";

/// SSB file type for grain sequences: "grsg".
pub const GSF_FILE_TYPE: [u8; 4] = *b"grsg";

/// Major version written by the encoder.
pub const GSF_MAJOR_VERSION: u16 = 8;

/// Minor version written by the encoder.
pub const GSF_MINOR_VERSION: u16 = 0;

/// Legacy major version still accepted on read.
pub const GSF_LEGACY_MAJOR_VERSION: u16 = 7;

/// Size of the SSB file header (signature + file type + version).
pub const FILE_HEADER_SIZE: u64 = 12;

/// Size of a block header (tag + size field).
pub const BLOCK_HEADER_SIZE: u64 = 8;

pub const TAG_HEAD: [u8; 4] = *b"head";
pub const TAG_SEGM: [u8; 4] = *b"segm";
pub const TAG_TAG: [u8; 4] = *b"tag ";
pub const TAG_GRAI: [u8; 4] = *b"grai";
pub const TAG_GBHD: [u8; 4] = *b"gbhd";
pub const TAG_TILS: [u8; 4] = *b"tils";
pub const TAG_VGHD: [u8; 4] = *b"vghd";
pub const TAG_COMP: [u8; 4] = *b"comp";
pub const TAG_CGHD: [u8; 4] = *b"cghd";
pub const TAG_UNOF: [u8; 4] = *b"unof";
pub const TAG_AGHD: [u8; 4] = *b"aghd";
pub const TAG_CAHD: [u8; 4] = *b"cahd";
pub const TAG_EGHD: [u8; 4] = *b"eghd";
pub const TAG_GRDT: [u8; 4] = *b"grdt";
pub const TAG_FILL: [u8; 4] = *b"fill";

/// Renders a block tag for log and error messages.
pub(crate) fn tag_str(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                (b as char).to_string()
            } else {
                format!("\\x{:02x}", b)
            }
        })
        .collect()
}
