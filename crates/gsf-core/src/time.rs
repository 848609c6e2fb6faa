//! Time Types
//!
//! GSF uses three distinct time representations:
//!
//! - [`GrainTimestamp`]: a signed nanosecond timestamp stored in 11 octets
//!   (1 sign byte, 6 bytes of seconds, 4 bytes of nanoseconds). Used for a
//!   grain's origin, sync and creation times.
//! - [`DateTime`]: a wall-clock date-time with seconds resolution stored in
//!   7 octets. Used for the file creation time.
//! - [`TimeLabel`]: a named timecode attached to a grain, stored in 29
//!   octets (16-byte tag plus 13-byte timecode).
//!
//! ## Sign convention
//!
//! The timestamp sign byte encodes "is positive": non-zero means the
//! magnitude counts forward from the epoch, zero means backward. A zero
//! magnitude is canonically positive, and equality treats `-0` and `+0` as
//! the same instant.

use crate::rational::Rational;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Largest representable seconds magnitude (48 bits on the wire).
pub const MAX_TIMESTAMP_SECS: u64 = (1 << 48) - 1;

/// A signed nanosecond timestamp with 48-bit seconds magnitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GrainTimestamp {
    /// Sign of the magnitude; true counts forward from the epoch.
    pub positive: bool,
    /// Whole seconds of the magnitude. Must fit in 48 bits.
    pub secs: u64,
    /// Nanosecond remainder. Must be below 1_000_000_000.
    pub nanos: u32,
}

impl GrainTimestamp {
    pub fn new(positive: bool, secs: u64, nanos: u32) -> Self {
        Self {
            // Zero magnitude is canonically positive.
            positive: positive || (secs == 0 && nanos == 0),
            secs,
            nanos,
        }
    }

    pub const fn zero() -> Self {
        Self {
            positive: true,
            secs: 0,
            nanos: 0,
        }
    }

    /// Builds a timestamp from a signed nanosecond count.
    pub fn from_nanos(nanos: i128) -> Self {
        let positive = nanos >= 0;
        let magnitude = nanos.unsigned_abs();
        Self::new(
            positive,
            (magnitude / NANOS_PER_SEC as u128) as u64,
            (magnitude % NANOS_PER_SEC as u128) as u32,
        )
    }

    /// The timestamp as a signed nanosecond count.
    ///
    /// The full range fits comfortably in an i128 (48-bit seconds times a
    /// nanosecond scale overflows i64).
    pub fn as_nanos(&self) -> i128 {
        let magnitude = self.secs as i128 * NANOS_PER_SEC as i128 + self.nanos as i128;
        if self.positive {
            magnitude
        } else {
            -magnitude
        }
    }

    /// Signed difference `self - other` in nanoseconds.
    pub fn offset_from(&self, other: &GrainTimestamp) -> i128 {
        self.as_nanos() - other.as_nanos()
    }

    /// The timestamp advanced by a signed nanosecond offset.
    pub fn offset_by(&self, nanos: i128) -> Self {
        Self::from_nanos(self.as_nanos() + nanos)
    }
}

impl PartialEq for GrainTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.as_nanos() == other.as_nanos()
    }
}

impl Eq for GrainTimestamp {}

impl PartialOrd for GrainTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GrainTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_nanos().cmp(&other.as_nanos())
    }
}

impl fmt::Display for GrainTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.positive { "" } else { "-" };
        write!(f, "{}{}:{:09}", sign, self.secs, self.nanos)
    }
}

/// A wall-clock date-time with seconds resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTime {
    pub year: i16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub fn new(year: i16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// The timecode half of a time label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    pub frames_since_midnight: u32,
    pub rate: Rational,
    pub drop_frame: bool,
}

/// A named timecode attached to a grain.
///
/// The tag occupies 16 bytes on the wire; longer tags cannot be stored and
/// shorter ones are NUL padded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLabel {
    pub tag: String,
    pub timecode: Timecode,
}

impl TimeLabel {
    pub fn new(tag: impl Into<String>, timecode: Timecode) -> Self {
        Self {
            tag: tag.into(),
            timecode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Sign and canonical zero
    // ---------------------------------------------------------------

    #[test]
    fn test_zero_is_positive() {
        let ts = GrainTimestamp::new(false, 0, 0);
        assert!(ts.positive);
        assert_eq!(ts, GrainTimestamp::zero());
    }

    #[test]
    fn test_negative_zero_equals_positive_zero() {
        let neg = GrainTimestamp {
            positive: false,
            secs: 0,
            nanos: 0,
        };
        assert_eq!(neg, GrainTimestamp::zero());
    }

    #[test]
    fn test_negative_timestamp_roundtrip_nanos() {
        let ts = GrainTimestamp::new(false, 5, 500_000_000);
        assert_eq!(ts.as_nanos(), -5_500_000_000);
        assert_eq!(GrainTimestamp::from_nanos(-5_500_000_000), ts);
    }

    // ---------------------------------------------------------------
    // Nanosecond arithmetic
    // ---------------------------------------------------------------

    #[test]
    fn test_from_nanos_splits_fields() {
        let ts = GrainTimestamp::from_nanos(1_040_000_000);
        assert_eq!(ts.secs, 1);
        assert_eq!(ts.nanos, 40_000_000);
        assert!(ts.positive);
    }

    #[test]
    fn test_offset_from() {
        let a = GrainTimestamp::from_nanos(1_040_000_000);
        let b = GrainTimestamp::from_nanos(1_000_000_000);
        assert_eq!(a.offset_from(&b), 40_000_000);
        assert_eq!(b.offset_from(&a), -40_000_000);
    }

    #[test]
    fn test_offset_by_crosses_zero() {
        let a = GrainTimestamp::from_nanos(500);
        assert_eq!(a.offset_by(-1_000).as_nanos(), -500);
    }

    #[test]
    fn test_large_seconds_do_not_overflow() {
        let ts = GrainTimestamp::new(true, MAX_TIMESTAMP_SECS, 999_999_999);
        let expect = MAX_TIMESTAMP_SECS as i128 * NANOS_PER_SEC as i128 + 999_999_999;
        assert_eq!(ts.as_nanos(), expect);
    }

    #[test]
    fn test_ordering() {
        let early = GrainTimestamp::from_nanos(-100);
        let late = GrainTimestamp::from_nanos(100);
        assert!(early < late);
        assert!(late > GrainTimestamp::zero());
    }

    // ---------------------------------------------------------------
    // Display
    // ---------------------------------------------------------------

    #[test]
    fn test_timestamp_display() {
        assert_eq!(GrainTimestamp::new(true, 2, 5).to_string(), "2:000000005");
        assert_eq!(
            GrainTimestamp::new(false, 1, 500_000_000).to_string(),
            "-1:500000000"
        );
    }

    #[test]
    fn test_datetime_display() {
        let dt = DateTime::new(2018, 9, 8, 16, 0, 0);
        assert_eq!(dt.to_string(), "2018-09-08T16:00:00Z");
    }

    // ---------------------------------------------------------------
    // Time labels
    // ---------------------------------------------------------------

    #[test]
    fn test_timelabel_equality() {
        let tc = Timecode {
            frames_since_midnight: 25,
            rate: Rational::new(25, 1),
            drop_frame: false,
        };
        assert_eq!(TimeLabel::new("tc0", tc), TimeLabel::new("tc0", tc));
        assert_ne!(TimeLabel::new("tc0", tc), TimeLabel::new("tc1", tc));
    }
}
