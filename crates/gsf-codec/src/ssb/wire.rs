//! Pure wire codecs shared by the sync and async paths.
//!
//! Block payloads are handed to the functions in this module as complete
//! byte slices. Keeping the parsing pure means the blocking and async
//! decoders share one implementation and only differ in how they fetch
//! payload bytes.
//!
//! All integers are little-endian. Every read is bounds-checked; a payload
//! shorter than its fields is a `MalformedBlock`, never a panic.

use super::{
    tag_str, BLOCK_HEADER_SIZE, TAG_AGHD, TAG_CAHD, TAG_CGHD, TAG_COMP, TAG_EGHD, TAG_GBHD,
    TAG_GRAI, TAG_GRDT, TAG_HEAD, TAG_SEGM, TAG_TAG, TAG_TILS, TAG_UNOF, TAG_VGHD,
};
use bytes::{BufMut, BytesMut};
use gsf_core::{
    AudioHeader, CodedAudioHeader, CodedVideoHeader, DateTime, Error, EventHeader, FileHeader,
    Grain, GrainHeader, GrainPayload, GrainTimestamp, Rational, Result, SegmentInfo, TimeLabel,
    Timecode, VideoComponent, VideoHeader,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Fixed part of a v8 `gbhd` body: two UUIDs, two timestamps, two
/// rationals.
const GBHD_BODY_SIZE_V8: u64 = 16 + 16 + 11 + 11 + 8 + 8;

/// One encoded time label: 16-byte tag, u32 count, rational, drop flag.
const TIME_LABEL_SIZE: u64 = 29;

// ---------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------

/// Bounds-checked cursor over one block payload.
///
/// `base` is the absolute stream offset of the payload start, used to give
/// errors a useful location.
pub(crate) struct PayloadCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> PayloadCursor<'a> {
    pub fn new(buf: &'a [u8], base: u64) -> Self {
        Self { buf, pos: 0, base }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn offset(&self) -> u64 {
        self.base + self.pos as u64
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::malformed(
                format!("payload ends {} bytes short", n - self.remaining()),
                self.offset(),
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// 48-bit unsigned integer, the seconds field of a timestamp.
    pub fn read_u48(&mut self) -> Result<u64> {
        let b = self.take(6)?;
        let mut v = 0u64;
        for (n, byte) in b.iter().enumerate() {
            v |= (*byte as u64) << (8 * n);
        }
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes(b.try_into().expect("slice is 8 bytes")))
    }

    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let b = self.take(16)?;
        Ok(Uuid::from_bytes(b.try_into().expect("slice is 16 bytes")))
    }

    pub fn read_rational(&mut self) -> Result<Rational> {
        let numerator = self.read_u32()?;
        let denominator = self.read_u32()?;
        Ok(Rational {
            numerator,
            denominator,
        })
    }

    /// Signed 11-byte timestamp: sign flag, 48-bit seconds, nanoseconds.
    pub fn read_timestamp(&mut self) -> Result<GrainTimestamp> {
        let at = self.offset();
        let positive = self.read_bool()?;
        let secs = self.read_u48()?;
        let nanos = self.read_u32()?;
        if nanos >= 1_000_000_000 {
            return Err(Error::malformed(
                format!("timestamp nanoseconds {} out of range", nanos),
                at,
            ));
        }
        Ok(GrainTimestamp::new(positive, secs, nanos))
    }

    /// Legacy 10-byte unsigned timestamp used by major version 7.
    pub fn read_legacy_timestamp(&mut self) -> Result<GrainTimestamp> {
        let at = self.offset();
        let secs = self.read_u48()?;
        let nanos = self.read_u32()?;
        if nanos >= 1_000_000_000 {
            return Err(Error::malformed(
                format!("timestamp nanoseconds {} out of range", nanos),
                at,
            ));
        }
        Ok(GrainTimestamp::new(true, secs, nanos))
    }

    /// 7-byte wall-clock date-time.
    pub fn read_datetime(&mut self) -> Result<DateTime> {
        Ok(DateTime {
            year: self.read_i16()?,
            month: self.read_u8()?,
            day: self.read_u8()?,
            hour: self.read_u8()?,
            minute: self.read_u8()?,
            second: self.read_u8()?,
        })
    }

    /// Fixed-size string slot, NUL padded.
    pub fn read_fixed_string(&mut self, len: usize) -> Result<String> {
        let at = self.offset();
        let raw = self.take(len)?;
        let trimmed = match raw.iter().position(|&b| b == 0) {
            Some(end) => &raw[..end],
            None => raw,
        };
        String::from_utf8(trimmed.to_vec())
            .map_err(|_| Error::malformed("fixed string is not valid UTF-8", at))
    }

    /// Length-prefixed string: u16 length, then that many UTF-8 bytes.
    pub fn read_varstring(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let at = self.offset();
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| Error::malformed("string is not valid UTF-8", at))
    }

    /// Length-prefixed byte array: u32 length, then that many bytes.
    pub fn read_varbytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Next child block within this payload: `(tag, payload, payload_base)`.
    ///
    /// Returns `None` when the payload is exhausted. Trailing bytes too
    /// short for a block header, or a child whose declared size crosses the
    /// parent's end, are malformed.
    pub fn next_child(&mut self) -> Result<Option<([u8; 4], &'a [u8], u64)>> {
        if self.remaining() == 0 {
            return Ok(None);
        }
        if self.remaining() < BLOCK_HEADER_SIZE as usize {
            return Err(Error::malformed(
                "partial block header at end of parent",
                self.offset(),
            ));
        }
        let at = self.offset();
        let tag: [u8; 4] = self.take(4)?.try_into().expect("slice is 4 bytes");
        let size = self.read_u32()? as u64;
        if size < BLOCK_HEADER_SIZE {
            return Err(Error::malformed(
                format!("block size {} underflows its own header", size),
                at,
            ));
        }
        let payload_len = (size - BLOCK_HEADER_SIZE) as usize;
        if payload_len > self.remaining() {
            return Err(Error::malformed(
                format!("child block {:?} exceeds its parent", tag_str(&tag)),
                at,
            ));
        }
        let base = self.offset();
        let payload = self.take(payload_len)?;
        Ok(Some((tag, payload, base)))
    }
}

/// Decodes a `head` payload: file id, creation time, segment declarations
/// with their tags, and file-level tags. Unknown children are skipped.
pub(crate) fn parse_head(payload: &[u8], base: u64) -> Result<FileHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    let id = cursor.read_uuid()?;
    let created = cursor.read_datetime()?;

    let mut segments: Vec<SegmentInfo> = Vec::new();
    let mut tags = Vec::new();

    while let Some((tag, child, child_base)) = cursor.next_child()? {
        match tag {
            TAG_SEGM => {
                let mut seg_cursor = PayloadCursor::new(child, child_base);
                let local_id = seg_cursor.read_u16()?;
                let seg_id = seg_cursor.read_uuid()?;
                let count = seg_cursor.read_i64()?;
                let mut seg_tags = Vec::new();
                while let Some((seg_child_tag, seg_child, seg_child_base)) =
                    seg_cursor.next_child()?
                {
                    if seg_child_tag == TAG_TAG {
                        let mut tag_cursor = PayloadCursor::new(seg_child, seg_child_base);
                        let key = tag_cursor.read_varstring()?;
                        let val = tag_cursor.read_varstring()?;
                        seg_tags.push((key, val));
                    }
                }
                if segments.iter().any(|s| s.local_id == local_id) {
                    return Err(Error::DuplicateLocalId(local_id));
                }
                segments.push(SegmentInfo {
                    local_id,
                    id: seg_id,
                    count,
                    tags: seg_tags,
                });
            }
            TAG_TAG => {
                let mut tag_cursor = PayloadCursor::new(child, child_base);
                let key = tag_cursor.read_varstring()?;
                let val = tag_cursor.read_varstring()?;
                tags.push((key, val));
            }
            other => {
                debug!(tag = %tag_str(&other), "skipping unknown head child block");
            }
        }
    }

    Ok(FileHeader {
        id,
        created,
        segments,
        tags,
    })
}

/// Decodes a `tils` payload into time labels.
fn parse_tils(payload: &[u8], base: u64) -> Result<Vec<TimeLabel>> {
    let mut cursor = PayloadCursor::new(payload, base);
    let count = cursor.read_u16()? as usize;
    let mut labels = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = cursor.read_fixed_string(16)?;
        let frames_since_midnight = cursor.read_u32()?;
        let rate = cursor.read_rational()?;
        let drop_frame = cursor.read_bool()?;
        labels.push(TimeLabel {
            tag,
            timecode: Timecode {
                frames_since_midnight,
                rate,
                drop_frame,
            },
        });
    }
    Ok(labels)
}

fn parse_vghd(payload: &[u8], base: u64) -> Result<VideoHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    let format = cursor.read_u32()?.into();
    let layout = cursor.read_u32()?.into();
    let width = cursor.read_u32()?;
    let height = cursor.read_u32()?;
    let extension = cursor.read_u32()?;
    let aspect_ratio = cursor.read_rational()?;
    let pixel_aspect_ratio = cursor.read_rational()?;

    let mut components = Vec::new();
    while let Some((tag, child, child_base)) = cursor.next_child()? {
        if tag != TAG_COMP {
            debug!(tag = %tag_str(&tag), "skipping unknown vghd child block");
            continue;
        }
        let mut comp_cursor = PayloadCursor::new(child, child_base);
        let count = comp_cursor.read_u16()? as usize;
        for _ in 0..count {
            components.push(VideoComponent {
                width: comp_cursor.read_u32()?,
                height: comp_cursor.read_u32()?,
                stride: comp_cursor.read_u32()?,
                length: comp_cursor.read_u32()?,
            });
        }
    }

    Ok(VideoHeader {
        format,
        layout,
        width,
        height,
        extension,
        aspect_ratio,
        pixel_aspect_ratio,
        components,
    })
}

fn parse_cghd(payload: &[u8], base: u64) -> Result<CodedVideoHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    let format = cursor.read_u32()?.into();
    let layout = cursor.read_u32()?.into();
    let origin_width = cursor.read_u32()?;
    let origin_height = cursor.read_u32()?;
    let coded_width = cursor.read_u32()?;
    let coded_height = cursor.read_u32()?;
    let key_frame = cursor.read_bool()?;
    let temporal_offset = cursor.read_i32()?;

    let mut unit_offsets = Vec::new();
    while let Some((tag, child, child_base)) = cursor.next_child()? {
        if tag != TAG_UNOF {
            debug!(tag = %tag_str(&tag), "skipping unknown cghd child block");
            continue;
        }
        let mut unof_cursor = PayloadCursor::new(child, child_base);
        let count = unof_cursor.read_u16()? as usize;
        for _ in 0..count {
            unit_offsets.push(unof_cursor.read_u32()?);
        }
    }

    Ok(CodedVideoHeader {
        format,
        layout,
        origin_width,
        origin_height,
        coded_width,
        coded_height,
        key_frame,
        temporal_offset,
        unit_offsets,
    })
}

fn parse_aghd(payload: &[u8], base: u64) -> Result<AudioHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    Ok(AudioHeader {
        format: cursor.read_u32()?.into(),
        channels: cursor.read_u16()?,
        samples: cursor.read_u32()?,
        sample_rate: cursor.read_u32()?,
    })
}

fn parse_cahd(payload: &[u8], base: u64) -> Result<CodedAudioHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    Ok(CodedAudioHeader {
        format: cursor.read_u32()?.into(),
        channels: cursor.read_u16()?,
        samples: cursor.read_u32()?,
        priming: cursor.read_u32()?,
        remainder: cursor.read_u32()?,
        sample_rate: cursor.read_u32()?,
    })
}

fn parse_eghd(payload: &[u8], base: u64) -> Result<EventHeader> {
    let mut cursor = PayloadCursor::new(payload, base);
    Ok(EventHeader {
        event_type: cursor.read_u8()?,
    })
}

/// Decodes a `gbhd` payload into a grain header and payload variant.
///
/// `major` selects the on-wire layout: version 7 carries a deprecated
/// 16-byte region after the flow id and unsigned 10-byte timestamps.
/// A body with no variant child decodes as an empty grain. Unknown child
/// tags are skipped so newer writers stay readable.
pub(crate) fn parse_gbhd(
    payload: &[u8],
    base: u64,
    major: u16,
) -> Result<(GrainHeader, GrainPayload)> {
    let mut cursor = PayloadCursor::new(payload, base);

    let source_id = cursor.read_uuid()?;
    let flow_id = cursor.read_uuid()?;
    let (origin_timestamp, sync_timestamp) = if major >= 8 {
        (cursor.read_timestamp()?, cursor.read_timestamp()?)
    } else {
        // Deprecated region present only in the legacy layout.
        cursor.skip(16)?;
        (
            cursor.read_legacy_timestamp()?,
            cursor.read_legacy_timestamp()?,
        )
    };
    let rate = cursor.read_rational()?;
    let duration = cursor.read_rational()?;

    let mut header = GrainHeader {
        source_id,
        flow_id,
        origin_timestamp,
        sync_timestamp,
        creation_timestamp: GrainTimestamp::zero(),
        rate,
        duration,
        timelabels: Vec::new(),
    };

    let mut payload_variant: Option<GrainPayload> = None;
    while let Some((tag, child, child_base)) = cursor.next_child()? {
        let parsed = match tag {
            TAG_TILS => {
                header.timelabels = parse_tils(child, child_base)?;
                continue;
            }
            TAG_VGHD => GrainPayload::Video(parse_vghd(child, child_base)?),
            TAG_CGHD => GrainPayload::CodedVideo(parse_cghd(child, child_base)?),
            TAG_AGHD => GrainPayload::Audio(parse_aghd(child, child_base)?),
            TAG_CAHD => GrainPayload::CodedAudio(parse_cahd(child, child_base)?),
            TAG_EGHD => GrainPayload::Event(parse_eghd(child, child_base)?),
            other => {
                debug!(tag = %tag_str(&other), "skipping unknown gbhd child block");
                continue;
            }
        };
        if payload_variant.is_some() {
            warn!(tag = %tag_str(&tag), "ignoring extra payload variant block");
        } else {
            payload_variant = Some(parsed);
        }
    }

    Ok((header, payload_variant.unwrap_or(GrainPayload::Empty)))
}

// ---------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------

fn put_u48(buf: &mut BytesMut, value: u64) {
    buf.put_slice(&value.to_le_bytes()[..6]);
}

fn put_timestamp(buf: &mut BytesMut, ts: &GrainTimestamp) -> Result<()> {
    if ts.secs >= 1 << 48 {
        return Err(Error::ValueOutOfRange(format!(
            "timestamp seconds {} exceed 48 bits",
            ts.secs
        )));
    }
    if ts.nanos >= 1_000_000_000 {
        return Err(Error::ValueOutOfRange(format!(
            "timestamp nanoseconds {} out of range",
            ts.nanos
        )));
    }
    buf.put_u8(ts.positive as u8);
    put_u48(buf, ts.secs);
    buf.put_u32_le(ts.nanos);
    Ok(())
}

fn put_datetime(buf: &mut BytesMut, dt: &DateTime) {
    buf.put_i16_le(dt.year);
    buf.put_u8(dt.month);
    buf.put_u8(dt.day);
    buf.put_u8(dt.hour);
    buf.put_u8(dt.minute);
    buf.put_u8(dt.second);
}

fn put_rational(buf: &mut BytesMut, r: &Rational) {
    buf.put_u32_le(r.numerator);
    buf.put_u32_le(r.denominator);
}

fn put_varstring(buf: &mut BytesMut, s: &str) -> Result<()> {
    let raw = s.as_bytes();
    if raw.len() > u16::MAX as usize {
        return Err(Error::ValueOutOfRange(format!(
            "string of {} bytes exceeds the 65535 byte limit",
            raw.len()
        )));
    }
    buf.put_u16_le(raw.len() as u16);
    buf.put_slice(raw);
    Ok(())
}

fn put_block_header(buf: &mut BytesMut, tag: &[u8; 4], total_size: u64) -> Result<()> {
    if total_size > u32::MAX as u64 {
        return Err(Error::ValueOutOfRange(format!(
            "block {:?} of {} bytes exceeds the u32 size field",
            tag_str(tag),
            total_size
        )));
    }
    buf.put_slice(tag);
    buf.put_u32_le(total_size as u32);
    Ok(())
}

fn tag_block_size(key: &str, val: &str) -> u64 {
    12 + key.len() as u64 + val.len() as u64
}

fn put_tag_block(buf: &mut BytesMut, key: &str, val: &str) -> Result<()> {
    put_block_header(buf, &TAG_TAG, tag_block_size(key, val))?;
    put_varstring(buf, key)?;
    put_varstring(buf, val)?;
    Ok(())
}

/// Serialises the 12-byte SSB file header.
pub(crate) fn encode_file_header(major: u16, minor: u16) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..4].copy_from_slice(&super::SSB_SIGNATURE);
    out[4..8].copy_from_slice(&super::GSF_FILE_TYPE);
    out[8..10].copy_from_slice(&major.to_le_bytes());
    out[10..12].copy_from_slice(&minor.to_le_bytes());
    out
}

/// Segment declarations handed to [`encode_head`].
pub(crate) struct HeadSegment<'a> {
    pub local_id: u16,
    pub id: Uuid,
    pub count: i64,
    pub tags: &'a [(String, String)],
}

/// Serialises the `head` block. Returns the bytes and, for each segment in
/// order, the offset of its count field relative to the start of the
/// returned buffer, for later back-patching.
pub(crate) fn encode_head(
    id: Uuid,
    created: &DateTime,
    segments: &[HeadSegment<'_>],
    tags: &[(String, String)],
) -> Result<(BytesMut, Vec<u64>)> {
    let segm_sizes: Vec<u64> = segments
        .iter()
        .map(|s| 34 + s.tags.iter().map(|(k, v)| tag_block_size(k, v)).sum::<u64>())
        .collect();
    let head_size = 31
        + segm_sizes.iter().sum::<u64>()
        + tags.iter().map(|(k, v)| tag_block_size(k, v)).sum::<u64>();

    let mut buf = BytesMut::with_capacity(head_size as usize);
    put_block_header(&mut buf, &TAG_HEAD, head_size)?;
    buf.put_slice(id.as_bytes());
    put_datetime(&mut buf, created);

    let mut count_offsets = Vec::with_capacity(segments.len());
    for (segment, segm_size) in segments.iter().zip(&segm_sizes) {
        put_block_header(&mut buf, &TAG_SEGM, *segm_size)?;
        buf.put_u16_le(segment.local_id);
        buf.put_slice(segment.id.as_bytes());
        count_offsets.push(buf.len() as u64);
        buf.put_i64_le(segment.count);
        for (key, val) in segment.tags {
            put_tag_block(&mut buf, key, val)?;
        }
    }

    for (key, val) in tags {
        put_tag_block(&mut buf, key, val)?;
    }

    debug_assert_eq!(buf.len() as u64, head_size);
    Ok((buf, count_offsets))
}

fn tils_block_size(labels: &[TimeLabel]) -> u64 {
    if labels.is_empty() {
        0
    } else {
        10 + TIME_LABEL_SIZE * labels.len() as u64
    }
}

fn variant_block_size(payload: &GrainPayload) -> u64 {
    match payload {
        GrainPayload::Empty => 0,
        GrainPayload::Video(v) => {
            let comp = if v.components.is_empty() {
                0
            } else {
                10 + 16 * v.components.len() as u64
            };
            44 + comp
        }
        GrainPayload::CodedVideo(c) => {
            let unof = if c.unit_offsets.is_empty() {
                0
            } else {
                10 + 4 * c.unit_offsets.len() as u64
            };
            37 + unof
        }
        GrainPayload::Audio(_) => 22,
        GrainPayload::CodedAudio(_) => 30,
        GrainPayload::Event(_) => 9,
    }
}

fn gbhd_block_size(grain: &Grain) -> u64 {
    BLOCK_HEADER_SIZE
        + GBHD_BODY_SIZE_V8
        + tils_block_size(&grain.header.timelabels)
        + variant_block_size(&grain.payload)
}

fn put_tils(buf: &mut BytesMut, labels: &[TimeLabel]) -> Result<()> {
    if labels.is_empty() {
        return Ok(());
    }
    put_block_header(buf, &TAG_TILS, tils_block_size(labels))?;
    buf.put_u16_le(labels.len() as u16);
    for label in labels {
        let raw = label.tag.as_bytes();
        if raw.len() > 16 {
            return Err(Error::ValueOutOfRange(format!(
                "time label tag {:?} exceeds 16 bytes",
                label.tag
            )));
        }
        let mut slot = [0u8; 16];
        slot[..raw.len()].copy_from_slice(raw);
        buf.put_slice(&slot);
        buf.put_u32_le(label.timecode.frames_since_midnight);
        put_rational(buf, &label.timecode.rate);
        buf.put_u8(label.timecode.drop_frame as u8);
    }
    Ok(())
}

fn put_variant(buf: &mut BytesMut, payload: &GrainPayload) -> Result<()> {
    match payload {
        GrainPayload::Empty => {}
        GrainPayload::Video(v) => {
            put_block_header(buf, &TAG_VGHD, variant_block_size(payload))?;
            buf.put_u32_le(v.format.to_u32());
            buf.put_u32_le(v.layout.to_u32());
            buf.put_u32_le(v.width);
            buf.put_u32_le(v.height);
            buf.put_u32_le(v.extension);
            put_rational(buf, &v.aspect_ratio);
            put_rational(buf, &v.pixel_aspect_ratio);
            if !v.components.is_empty() {
                put_block_header(buf, &TAG_COMP, 10 + 16 * v.components.len() as u64)?;
                buf.put_u16_le(v.components.len() as u16);
                for comp in &v.components {
                    buf.put_u32_le(comp.width);
                    buf.put_u32_le(comp.height);
                    buf.put_u32_le(comp.stride);
                    buf.put_u32_le(comp.length);
                }
            }
        }
        GrainPayload::CodedVideo(c) => {
            put_block_header(buf, &TAG_CGHD, variant_block_size(payload))?;
            buf.put_u32_le(c.format.to_u32());
            buf.put_u32_le(c.layout.to_u32());
            buf.put_u32_le(c.origin_width);
            buf.put_u32_le(c.origin_height);
            buf.put_u32_le(c.coded_width);
            buf.put_u32_le(c.coded_height);
            buf.put_u8(c.key_frame as u8);
            buf.put_i32_le(c.temporal_offset);
            if !c.unit_offsets.is_empty() {
                put_block_header(buf, &TAG_UNOF, 10 + 4 * c.unit_offsets.len() as u64)?;
                buf.put_u16_le(c.unit_offsets.len() as u16);
                for offset in &c.unit_offsets {
                    buf.put_u32_le(*offset);
                }
            }
        }
        GrainPayload::Audio(a) => {
            put_block_header(buf, &TAG_AGHD, variant_block_size(payload))?;
            buf.put_u32_le(a.format.to_u32());
            buf.put_u16_le(a.channels);
            buf.put_u32_le(a.samples);
            buf.put_u32_le(a.sample_rate);
        }
        GrainPayload::CodedAudio(a) => {
            put_block_header(buf, &TAG_CAHD, variant_block_size(payload))?;
            buf.put_u32_le(a.format.to_u32());
            buf.put_u16_le(a.channels);
            buf.put_u32_le(a.samples);
            buf.put_u32_le(a.priming);
            buf.put_u32_le(a.remainder);
            buf.put_u32_le(a.sample_rate);
        }
        GrainPayload::Event(e) => {
            put_block_header(buf, &TAG_EGHD, variant_block_size(payload))?;
            buf.put_u8(e.event_type);
        }
    }
    Ok(())
}

/// Serialises one complete `grai` block for the grain.
///
/// The grain's data region must be materialized; the encoder has no access
/// to the stream a lazy handle points into.
pub(crate) fn encode_grain(local_id: u16, grain: &Grain) -> Result<BytesMut> {
    let data = grain.data.bytes().ok_or_else(|| {
        Error::ValueOutOfRange("grain data is an unresolved lazy handle".to_string())
    })?;

    let gbhd_size = gbhd_block_size(grain);
    let grdt_size = BLOCK_HEADER_SIZE + data.len() as u64;
    let grai_size = BLOCK_HEADER_SIZE + 2 + gbhd_size + grdt_size;

    let mut buf = BytesMut::with_capacity(grai_size as usize);
    put_block_header(&mut buf, &TAG_GRAI, grai_size)?;
    buf.put_u16_le(local_id);

    put_block_header(&mut buf, &TAG_GBHD, gbhd_size)?;
    buf.put_slice(grain.header.source_id.as_bytes());
    buf.put_slice(grain.header.flow_id.as_bytes());
    put_timestamp(&mut buf, &grain.header.origin_timestamp)?;
    put_timestamp(&mut buf, &grain.header.sync_timestamp)?;
    put_rational(&mut buf, &grain.header.rate);
    put_rational(&mut buf, &grain.header.duration);
    put_tils(&mut buf, &grain.header.timelabels)?;
    put_variant(&mut buf, &grain.payload)?;

    put_block_header(&mut buf, &TAG_GRDT, grdt_size)?;
    buf.put_slice(data);

    debug_assert_eq!(buf.len() as u64, grai_size);
    Ok(buf)
}

/// The 8-byte stream terminator: a `grai` block with a size field of zero.
pub(crate) fn encode_terminator() -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&TAG_GRAI);
    out
}
