//! Cog Media Format Enumerations
//!
//! Frame formats, frame layouts and audio formats are closed sets of named
//! u32 values. The numeric values are bit fields:
//!
//! ```text
//! CogFrameFormat (u32):
//!   bit  0      horizontal subsampling shift
//!   bit  1      vertical subsampling shift
//!   bits 2-3    bytes per value (0 => 1, 1 => 2, 2 => 4)
//!   bit  4      planar RGB
//!   bit  8      packed
//!   bit  9      compressed
//!   bits 10-15  active bits per value
//! ```
//!
//! Values decoded from a file that do not match a named entry are preserved
//! round-trip in an `Unknown` variant carrying the raw u32, so re-encoding a
//! file never loses information.

use serde::{Deserialize, Serialize};

macro_rules! cog_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[allow(non_camel_case_types)]
        pub enum $name {
            $($variant,)+
            /// A numeric value with no named entry, preserved round-trip.
            Unknown(u32),
        }

        impl $name {
            pub fn from_u32(value: u32) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            pub fn to_u32(self) -> u32 {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unknown(other) => other,
                }
            }

            pub fn name(&self) -> String {
                match self {
                    $(Self::$variant => stringify!($variant).to_string(),)+
                    Self::Unknown(other) => format!("Unknown(0x{:08x})", other),
                }
            }

            /// Looks up a named entry, for command-line parsing.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self::from_u32(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.to_u32()
            }
        }
    };
}

cog_enum! {
    /// Pixel formats for video grains.
    CogFrameFormat {
        UNKNOWN = 0x0000,

        MJPEG = 0x0200,
        DNxHD = 0x0201,
        MPEG2 = 0x0202,
        AVCI = 0x0203,
        H264 = 0x0204,
        DV = 0x0205,
        D10 = 0x0206,
        VC2 = 0x0207,
        VP8 = 0x0208,

        UYVY = 0x2100,
        YUYV = 0x2101,
        AYUV = 0x2102,
        RGB = 0x2104,
        RGBx = 0x2110,
        RGBA = 0x2111,
        BGRx = 0x2112,
        BGRA = 0x2113,
        ARGB = 0x2114,
        xRGB = 0x2115,
        ABGR = 0x2116,
        xBGR = 0x2117,
        v216 = 0x4105,
        v210 = 0x2906,

        U8_444 = 0x2000,
        U8_422 = 0x2001,
        U8_420 = 0x2003,
        U8_444_RGB = 0x2010,
        S16_444_10BIT = 0x2804,
        S16_422_10BIT = 0x2805,
        S16_420_10BIT = 0x2807,
        S16_444_12BIT = 0x3004,
        S16_422_12BIT = 0x3005,
        S16_420_12BIT = 0x3007,
        S16_444 = 0x4004,
        S16_422 = 0x4005,
        S16_420 = 0x4007,
        S16_444_RGB = 0x4014,
        S32_444 = 0x8008,
        S32_422 = 0x8009,
        S32_420 = 0x800b,
        S32_444_RGB = 0x8018,
    }
}

impl CogFrameFormat {
    pub fn is_packed(&self) -> bool {
        (self.to_u32() >> 8) & 0x1 != 0
    }

    pub fn is_compressed(&self) -> bool {
        (self.to_u32() >> 9) & 0x1 != 0
    }

    pub fn is_planar(&self) -> bool {
        (self.to_u32() >> 8) & 0x3 == 0
    }

    pub fn is_planar_rgb(&self) -> bool {
        (self.to_u32() >> 4) & 0x31 == 0x1
    }

    /// Storage bytes per component value (1, 2 or 4).
    pub fn bytes_per_value(&self) -> u32 {
        [1, 2, 4, 4][((self.to_u32() & 0xc) >> 2) as usize]
    }

    /// Horizontal chroma subsampling shift.
    pub fn h_shift(&self) -> u32 {
        self.to_u32() & 0x1
    }

    /// Vertical chroma subsampling shift.
    pub fn v_shift(&self) -> u32 {
        (self.to_u32() >> 1) & 0x1
    }

    /// Significant bits per component value.
    pub fn active_bits(&self) -> u32 {
        (self.to_u32() >> 10) & 0x3f
    }
}

cog_enum! {
    /// Interlacing layouts for video grains.
    CogFrameLayout {
        FULL_FRAME = 0x00,
        SEPARATE_FIELDS = 0x01,
        SINGLE_FIELD = 0x02,
        MIXED_FIELDS = 0x03,
        SEGMENTED_FRAME = 0x04,
        UNKNOWN_LAYOUT = 0xffffffff,
    }
}

cog_enum! {
    /// Sample formats for audio grains.
    CogAudioFormat {
        S16_PLANES = 0x00,
        S16_PAIRS = 0x01,
        S16_INTERLEAVED = 0x02,
        S24_PLANES = 0x04,
        S24_PAIRS = 0x05,
        S24_INTERLEAVED = 0x06,
        S32_PLANES = 0x08,
        S32_PAIRS = 0x09,
        S32_INTERLEAVED = 0x0a,
        S64_INVALID = 0x0c,
        FLOAT_PLANES = 0x18,
        FLOAT_PAIRS = 0x19,
        FLOAT_INTERLEAVED = 0x1a,
        DOUBLE_PLANES = 0x1c,
        DOUBLE_PAIRS = 0x1d,
        DOUBLE_INTERLEAVED = 0x1e,
        AAC = 0x200,
        MP1 = 0x201,
        OPUS = 0x202,
        INVALID = 0xffffffff,
    }
}

impl CogAudioFormat {
    pub fn is_compressed(&self) -> bool {
        self.to_u32() & 0x200 != 0
    }

    pub fn is_float(&self) -> bool {
        self.to_u32() & 0x10 != 0 && !self.is_compressed()
    }

    /// Storage bytes per sample value (2, 3, 4 or 8).
    pub fn bytes_per_sample(&self) -> u32 {
        [2, 3, 4, 8][((self.to_u32() >> 2) & 0x3) as usize]
    }

    pub fn is_planes(&self) -> bool {
        self.to_u32() & 0x3 == 0 && !self.is_compressed()
    }

    pub fn is_pairs(&self) -> bool {
        self.to_u32() & 0x3 == 1 && !self.is_compressed()
    }

    pub fn is_interleaved(&self) -> bool {
        self.to_u32() & 0x3 == 2 && !self.is_compressed()
    }
}
