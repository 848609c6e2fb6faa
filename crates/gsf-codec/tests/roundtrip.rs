//! End-to-end encode/decode tests over in-memory streams.

use bytes::Bytes;
use gsf_codec::{BlockWriter, DecodeOptions, GsfDecoder, GsfEncoder};
use gsf_core::{
    CogFrameFormat, CogFrameLayout, DateTime, Error, Grain, GrainTimestamp, GrainType, Rational,
};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn src_id() -> Uuid {
    Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap()
}

fn flow_id() -> Uuid {
    Uuid::parse_str("11223344-5566-7788-99aa-bbccddeeff00").unwrap()
}

fn empty_grain() -> Grain {
    let mut grain = Grain::empty(src_id(), flow_id(), GrainTimestamp::zero());
    grain.header.rate = Rational::new(25, 1);
    grain.header.duration = Rational::new(1, 25);
    grain
}

/// Encodes grains into a single-segment file on a seekable buffer.
fn encode_file(grains: &[Grain]) -> Vec<u8> {
    let mut enc = GsfEncoder::seekable(Cursor::new(Vec::new()))
        .with_created(DateTime::new(2018, 9, 8, 16, 0, 0));
    let local_id = enc.add_segment(None, None, Vec::new()).unwrap();
    enc.start().unwrap();
    for grain in grains {
        enc.add_grain(local_id, grain).unwrap();
    }
    enc.end().unwrap();
    enc.into_inner().into_inner().into_inner()
}

// -------------------------------------------------------------------
// Round trips
// -------------------------------------------------------------------

#[test]
fn test_empty_grain_roundtrip() {
    let grain = empty_grain();
    let bytes = encode_file(std::slice::from_ref(&grain));

    // The grdt block directly precedes the 8-byte terminator and has a
    // size field of exactly 8.
    let grdt_start = bytes.len() - 16;
    assert_eq!(&bytes[grdt_start..grdt_start + 4], b"grdt");
    assert_eq!(
        u32::from_le_bytes(bytes[grdt_start + 4..grdt_start + 8].try_into().unwrap()),
        8
    );

    let (header, segments) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();
    assert_eq!(header.segments.len(), 1);
    assert_eq!(header.segments[0].count, 1);
    let decoded = &segments[&1][0];
    assert_eq!(decoded, &grain);
    assert_eq!(decoded.grain_type(), GrainType::Empty);
}

#[test]
fn test_video_grain_roundtrip_with_pattern() {
    let mut grain = Grain::video(
        src_id(),
        flow_id(),
        GrainTimestamp::from_nanos(1_000_000_000),
        CogFrameFormat::U8_422,
        CogFrameLayout::FULL_FRAME,
        16,
        2,
    );
    let pattern: Vec<u8> = (0..64u32).map(|i| (i * 3 % 251) as u8).collect();
    grain.set_data(Bytes::from(pattern.clone()));

    let bytes = encode_file(std::slice::from_ref(&grain));
    let (_, segments) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();
    let decoded = &segments[&1][0];

    assert_eq!(decoded, &grain);
    let video = match &decoded.payload {
        gsf_core::GrainPayload::Video(v) => v,
        other => panic!("expected video, got {:?}", other.grain_type()),
    };
    assert_eq!(video.component_offsets(), vec![0, 32, 48]);

    // Bytes at each computed offset match the pattern.
    let data = decoded.data.bytes().unwrap();
    for (offset, comp) in video.component_offsets().iter().zip(&video.components) {
        let start = *offset as usize;
        let end = start + comp.length as usize;
        assert_eq!(&data[start..end], &pattern[start..end]);
    }
}

#[test]
fn test_multi_segment_roundtrip() {
    let mut enc = GsfEncoder::seekable(Cursor::new(Vec::new()));
    let video_seg = enc.add_segment(Some(1), None, vec![]).unwrap();
    let audio_seg = enc
        .add_segment(Some(2), None, vec![("codec".into(), "pcm".into())])
        .unwrap();
    enc.add_file_tag("project", "demo").unwrap();
    enc.start().unwrap();

    let video = Grain::video(
        src_id(),
        flow_id(),
        GrainTimestamp::zero(),
        CogFrameFormat::U8_420,
        CogFrameLayout::FULL_FRAME,
        32,
        16,
    );
    let audio = Grain::audio(
        src_id(),
        flow_id(),
        GrainTimestamp::zero(),
        gsf_core::CogAudioFormat::S16_INTERLEAVED,
        2,
        480,
        48000,
    );
    enc.add_grain(video_seg, &video).unwrap();
    enc.add_grain(audio_seg, &audio).unwrap();
    enc.add_grain(video_seg, &video).unwrap();
    enc.end().unwrap();

    let bytes = enc.into_inner().into_inner().into_inner();
    let (header, segments) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();

    assert_eq!(header.tags, vec![("project".to_string(), "demo".to_string())]);
    assert_eq!(header.segment(2).unwrap().tags[0].0, "codec");
    assert_eq!(header.segment(1).unwrap().count, 2);
    assert_eq!(header.segment(2).unwrap().count, 1);
    assert_eq!(segments[&1].len(), 2);
    assert_eq!(segments[&2][0], audio);
}

#[test]
fn test_timelabels_roundtrip() {
    let mut grain = empty_grain();
    grain.header.timelabels.push(gsf_core::TimeLabel::new(
        "tc0",
        gsf_core::Timecode {
            frames_since_midnight: 1_440_000,
            rate: Rational::new(25, 1),
            drop_frame: true,
        },
    ));
    let bytes = encode_file(std::slice::from_ref(&grain));
    let (_, segments) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();
    assert_eq!(segments[&1][0].header.timelabels, grain.header.timelabels);
}

// -------------------------------------------------------------------
// Streaming sinks and counts
// -------------------------------------------------------------------

#[test]
fn test_streaming_sink_leaves_counts_unknown() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    let local_id = enc.add_segment(None, None, Vec::new()).unwrap();
    enc.start().unwrap();
    for _ in 0..3 {
        enc.add_grain(local_id, &empty_grain()).unwrap();
    }
    enc.end().unwrap();
    let bytes = enc.into_inner().into_inner();

    // Terminator is the final 8 bytes.
    assert_eq!(&bytes[bytes.len() - 8..bytes.len() - 4], b"grai");
    assert_eq!(&bytes[bytes.len() - 4..], &[0u8; 4]);

    let mut dec = GsfDecoder::new(Cursor::new(bytes)).unwrap();
    assert_eq!(dec.file_header().segments[0].count, -1);
    let grains: Vec<_> = dec
        .grains(DecodeOptions::default())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(grains.len(), 3);
    assert!(dec.saw_terminator());
}

#[test]
fn test_seekable_sink_back_patches_counts() {
    let bytes = encode_file(&[empty_grain(), empty_grain(), empty_grain()]);
    let (header, _) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();
    assert_eq!(header.segments[0].count, 3);
}

// -------------------------------------------------------------------
// Lazy data
// -------------------------------------------------------------------

/// Counts bytes actually read through it.
struct SpyReader<R> {
    inner: R,
    read: Arc<AtomicU64>,
}

impl<R: Read> Read for SpyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

impl<R: Seek> Seek for SpyReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[test]
fn test_skip_data_reads_only_headers() {
    const FRAME: usize = 6_220_800;
    let mut grains = Vec::new();
    for n in 0..3u8 {
        let mut grain = empty_grain();
        grain.payload = gsf_core::GrainPayload::Event(gsf_core::EventHeader { event_type: 0 });
        grain.set_data(Bytes::from(vec![n; FRAME]));
        grains.push(grain);
    }
    let bytes = encode_file(&grains);
    let file_len = bytes.len() as u64;

    let read_counter = Arc::new(AtomicU64::new(0));
    let spy = SpyReader {
        inner: Cursor::new(bytes),
        read: read_counter.clone(),
    };

    let mut dec = GsfDecoder::new(spy).unwrap();
    let mut decoded = Vec::new();
    for item in dec.grains(DecodeOptions::default().skip_data(true)) {
        let (_, grain) = item.unwrap();
        assert!(grain.data.is_lazy());
        assert_eq!(grain.length(), FRAME as u64);
        decoded.push(grain);
    }

    // All three payloads stayed on disk; only framing was read.
    let read = read_counter.load(Ordering::Relaxed);
    assert!(read < 1024, "read {} bytes of a {} byte file", read, file_len);

    // Handles resolve once iteration has ended.
    dec.load_data(&mut decoded[1]).unwrap();
    assert_eq!(decoded[1].data.bytes().unwrap()[0], 1);
    assert_eq!(decoded[1].length(), FRAME as u64);
}

#[test]
fn test_lazy_load_during_iteration_is_refused() {
    let mut grain = empty_grain();
    grain.payload = gsf_core::GrainPayload::Event(gsf_core::EventHeader { event_type: 0 });
    grain.set_data(Bytes::from(vec![7u8; 64]));
    let bytes = encode_file(&[grain.clone(), grain]);

    let mut dec = GsfDecoder::new(Cursor::new(bytes)).unwrap();
    let mut iter = dec.grains(DecodeOptions::default().skip_data(true));
    let (_, mut first) = iter.next().unwrap().unwrap();
    drop(iter);

    // The grain loop has not reached the terminator yet.
    assert!(matches!(
        dec.load_data(&mut first),
        Err(Error::DecoderBusy)
    ));
}

#[test]
fn test_local_id_filter_skips_other_segments() {
    let mut enc = GsfEncoder::seekable(Cursor::new(Vec::new()));
    enc.add_segment(Some(1), None, vec![]).unwrap();
    enc.add_segment(Some(2), None, vec![]).unwrap();
    enc.start().unwrap();
    enc.add_grain(1, &empty_grain()).unwrap();
    enc.add_grain(2, &empty_grain()).unwrap();
    enc.add_grain(1, &empty_grain()).unwrap();
    enc.end().unwrap();
    let bytes = enc.into_inner().into_inner().into_inner();

    let mut dec = GsfDecoder::new(Cursor::new(bytes)).unwrap();
    let only_two: Vec<_> = dec
        .grains(DecodeOptions::default().local_ids([2u16]))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(only_two.len(), 1);
    assert_eq!(only_two[0].0, 2);
}

// -------------------------------------------------------------------
// Forward compatibility
// -------------------------------------------------------------------

/// Hand-writes a minimal v8 file, optionally with a newer minor version,
/// an unknown top-level block, and an unknown child inside the gbhd.
fn handwritten_file(minor: u16, unknown_blocks: bool) -> Vec<u8> {
    let mut w = BlockWriter::new(Vec::new());
    w.write_bytes(b"SSBB").unwrap();
    w.write_bytes(b"grsg").unwrap();
    w.write_bytes(&8u16.to_le_bytes()).unwrap();
    w.write_bytes(&minor.to_le_bytes()).unwrap();

    // head with one segment.
    w.begin_block(*b"head").unwrap();
    w.write_bytes(src_id().as_bytes()).unwrap();
    w.write_bytes(&2018i16.to_le_bytes()).unwrap();
    w.write_bytes(&[9, 8, 16, 0, 0]).unwrap();
    w.begin_block(*b"segm").unwrap();
    w.write_bytes(&1u16.to_le_bytes()).unwrap();
    w.write_bytes(flow_id().as_bytes()).unwrap();
    w.write_bytes(&(-1i64).to_le_bytes()).unwrap();
    w.end_block().unwrap();
    w.end_block().unwrap();

    if unknown_blocks {
        // An unrecognised top-level block between head and the grain.
        w.begin_block(*b"zzzz").unwrap();
        w.write_bytes(&[0xAB; 20]).unwrap();
        w.end_block().unwrap();
        w.write_fill(16).unwrap();
    }

    // One empty grain.
    w.begin_block(*b"grai").unwrap();
    w.write_bytes(&1u16.to_le_bytes()).unwrap();
    w.begin_block(*b"gbhd").unwrap();
    w.write_bytes(src_id().as_bytes()).unwrap();
    w.write_bytes(flow_id().as_bytes()).unwrap();
    // origin and sync timestamps: positive zero.
    for _ in 0..2 {
        w.write_bytes(&[1]).unwrap();
        w.write_bytes(&[0; 10]).unwrap();
    }
    w.write_bytes(&25u32.to_le_bytes()).unwrap();
    w.write_bytes(&1u32.to_le_bytes()).unwrap();
    w.write_bytes(&1u32.to_le_bytes()).unwrap();
    w.write_bytes(&25u32.to_le_bytes()).unwrap();
    if unknown_blocks {
        w.begin_block(*b"xxxx").unwrap();
        w.write_bytes(&[0xCD; 8]).unwrap();
        w.end_block().unwrap();
    }
    w.end_block().unwrap();
    w.begin_block(*b"grdt").unwrap();
    w.end_block().unwrap();
    w.end_block().unwrap();

    // Terminator.
    w.write_bytes(b"grai").unwrap();
    w.write_bytes(&0u32.to_le_bytes()).unwrap();
    w.into_inner().unwrap()
}

#[test]
fn test_newer_minor_and_unknown_blocks_tolerated() {
    let plain = handwritten_file(0, false);
    let noisy = handwritten_file(99, true);

    let (header_a, grains_a) = GsfDecoder::decode_all(Cursor::new(plain)).unwrap();
    let (header_b, grains_b) = GsfDecoder::decode_all(Cursor::new(noisy)).unwrap();
    assert_eq!(header_a, header_b);
    assert_eq!(grains_a, grains_b);
    assert_eq!(grains_b[&1][0].grain_type(), GrainType::Empty);
}

#[test]
fn test_legacy_v7_layout_readable() {
    let mut w = BlockWriter::new(Vec::new());
    w.write_bytes(b"SSBB").unwrap();
    w.write_bytes(b"grsg").unwrap();
    w.write_bytes(&7u16.to_le_bytes()).unwrap();
    w.write_bytes(&0u16.to_le_bytes()).unwrap();

    w.begin_block(*b"head").unwrap();
    w.write_bytes(src_id().as_bytes()).unwrap();
    w.write_bytes(&2018i16.to_le_bytes()).unwrap();
    w.write_bytes(&[9, 8, 16, 0, 0]).unwrap();
    w.begin_block(*b"segm").unwrap();
    w.write_bytes(&1u16.to_le_bytes()).unwrap();
    w.write_bytes(flow_id().as_bytes()).unwrap();
    w.write_bytes(&(-1i64).to_le_bytes()).unwrap();
    w.end_block().unwrap();
    w.end_block().unwrap();

    w.begin_block(*b"grai").unwrap();
    w.write_bytes(&1u16.to_le_bytes()).unwrap();
    w.begin_block(*b"gbhd").unwrap();
    w.write_bytes(src_id().as_bytes()).unwrap();
    w.write_bytes(flow_id().as_bytes()).unwrap();
    // Deprecated 16-byte region, then two 10-byte unsigned timestamps.
    w.write_bytes(&[0; 16]).unwrap();
    w.write_bytes(&5u64.to_le_bytes()[..6]).unwrap();
    w.write_bytes(&250_000_000u32.to_le_bytes()).unwrap();
    w.write_bytes(&5u64.to_le_bytes()[..6]).unwrap();
    w.write_bytes(&250_000_000u32.to_le_bytes()).unwrap();
    w.write_bytes(&25u32.to_le_bytes()).unwrap();
    w.write_bytes(&1u32.to_le_bytes()).unwrap();
    w.write_bytes(&1u32.to_le_bytes()).unwrap();
    w.write_bytes(&25u32.to_le_bytes()).unwrap();
    w.end_block().unwrap();
    w.begin_block(*b"grdt").unwrap();
    w.end_block().unwrap();
    w.end_block().unwrap();

    w.write_bytes(b"grai").unwrap();
    w.write_bytes(&0u32.to_le_bytes()).unwrap();
    let bytes = w.into_inner().unwrap();

    let (_, grains) = GsfDecoder::decode_all(Cursor::new(bytes)).unwrap();
    let grain = &grains[&1][0];
    assert_eq!(
        grain.header.origin_timestamp,
        GrainTimestamp::new(true, 5, 250_000_000)
    );
}

// -------------------------------------------------------------------
// Error cases
// -------------------------------------------------------------------

#[test]
fn test_wrong_file_type_rejected() {
    let mut bytes = encode_file(&[empty_grain()]);
    bytes[4..8].copy_from_slice(b"vidx");
    assert!(matches!(
        GsfDecoder::new(Cursor::new(bytes)),
        Err(Error::WrongFileType { .. })
    ));
}

#[test]
fn test_unsupported_major_rejected() {
    let mut bytes = encode_file(&[empty_grain()]);
    bytes[8..10].copy_from_slice(&9u16.to_le_bytes());
    assert!(matches!(
        GsfDecoder::new(Cursor::new(bytes)),
        Err(Error::UnsupportedMajorVersion { major: 9, .. })
    ));
}

#[test]
fn test_missing_terminator_strict_vs_streaming() {
    let mut bytes = encode_file(&[empty_grain()]);
    bytes.truncate(bytes.len() - 8);

    // Streaming iteration accepts the clean end of stream.
    let mut dec = GsfDecoder::new(Cursor::new(bytes.clone())).unwrap();
    let grains: Vec<_> = dec
        .grains(DecodeOptions::default())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(grains.len(), 1);
    assert!(!dec.saw_terminator());

    // Strict decode reports the truncation.
    assert!(matches!(
        GsfDecoder::decode_all(Cursor::new(bytes)),
        Err(Error::TruncatedInput)
    ));
}

#[test]
fn test_truncated_mid_block_fails() {
    let mut bytes = encode_file(&[empty_grain()]);
    let cut = bytes.len() - 30;
    bytes.truncate(cut);
    let mut dec = GsfDecoder::new(Cursor::new(bytes)).unwrap();
    let result: Result<Vec<_>, _> = dec.grains(DecodeOptions::default()).collect();
    assert!(matches!(result, Err(Error::TruncatedInput)));
}

#[test]
fn test_undeclared_local_id_strict() {
    let mut enc = GsfEncoder::seekable(Cursor::new(Vec::new()));
    enc.add_segment(Some(1), None, vec![]).unwrap();
    enc.start().unwrap();
    enc.add_grain(1, &empty_grain()).unwrap();
    enc.end().unwrap();
    let mut bytes = enc.into_inner().into_inner().into_inner();

    // Rewrite the grain's local id to an undeclared value. The grai block
    // follows the head; find it by scanning for the tag.
    let grai_pos = bytes
        .windows(4)
        .position(|win| win == b"grai".as_slice())
        .unwrap();
    bytes[grai_pos + 8..grai_pos + 10].copy_from_slice(&9u16.to_le_bytes());

    assert!(matches!(
        GsfDecoder::decode_all(Cursor::new(bytes)),
        Err(Error::UnknownLocalId(9))
    ));
}

#[test]
fn test_grdt_shorter_than_components_fails() {
    let grain = Grain::video(
        src_id(),
        flow_id(),
        GrainTimestamp::zero(),
        CogFrameFormat::U8_422,
        CogFrameLayout::FULL_FRAME,
        16,
        2,
    );
    let mut bytes = encode_file(std::slice::from_ref(&grain));

    // Shrink the grdt payload by rewriting the sizes: drop the final 16
    // data bytes, pulling the terminator forward.
    let grdt_pos = bytes
        .windows(4)
        .rposition(|win| win == b"grdt".as_slice())
        .unwrap();
    let old_grdt = u32::from_le_bytes(bytes[grdt_pos + 4..grdt_pos + 8].try_into().unwrap());
    bytes[grdt_pos + 4..grdt_pos + 8].copy_from_slice(&(old_grdt - 16).to_le_bytes());
    let grai_pos = bytes.windows(4).position(|win| win == b"grai".as_slice()).unwrap();
    let old_grai = u32::from_le_bytes(bytes[grai_pos + 4..grai_pos + 8].try_into().unwrap());
    bytes[grai_pos + 4..grai_pos + 8].copy_from_slice(&(old_grai - 16).to_le_bytes());
    let data_end = grdt_pos + old_grdt as usize;
    bytes.drain(data_end - 16..data_end);

    let mut dec = GsfDecoder::new(Cursor::new(bytes)).unwrap();
    let result: Result<Vec<_>, _> = dec.grains(DecodeOptions::default()).collect();
    assert!(matches!(
        result,
        Err(Error::TruncatedPayload {
            expected: 64,
            actual: 48
        })
    ));
}

// -------------------------------------------------------------------
// Encoder state machine
// -------------------------------------------------------------------

#[test]
fn test_segment_changes_rejected_after_start() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    enc.add_segment(None, None, vec![]).unwrap();
    enc.start().unwrap();
    assert!(matches!(
        enc.add_segment(None, None, vec![]),
        Err(Error::EncoderState(_))
    ));
    assert!(matches!(
        enc.add_file_tag("k", "v"),
        Err(Error::EncoderState(_))
    ));
}

#[test]
fn test_add_grain_requires_start() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    let local_id = enc.add_segment(None, None, vec![]).unwrap();
    assert!(matches!(
        enc.add_grain(local_id, &empty_grain()),
        Err(Error::EncoderState(_))
    ));
}

#[test]
fn test_end_requires_start() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    assert!(matches!(enc.end(), Err(Error::EncoderState(_))));
}

#[test]
fn test_duplicate_segment_local_id_rejected() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    enc.add_segment(Some(4), None, vec![]).unwrap();
    assert!(matches!(
        enc.add_segment(Some(4), None, vec![]),
        Err(Error::DuplicateLocalId(4))
    ));
}

#[test]
fn test_grain_for_unknown_segment_rejected() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    enc.add_segment(Some(1), None, vec![]).unwrap();
    enc.start().unwrap();
    assert!(matches!(
        enc.add_grain(3, &empty_grain()),
        Err(Error::UnknownLocalId(3))
    ));
}

/// A sink that fails every write after the first `ok_writes`.
struct FailingSink {
    ok_writes: usize,
}

impl std::io::Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.ok_writes == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        }
        self.ok_writes -= 1;
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_is_sticky() {
    let mut enc = GsfEncoder::streaming(FailingSink { ok_writes: 2 });
    let local_id = enc.add_segment(None, None, vec![]).unwrap();
    enc.start().unwrap();

    assert!(matches!(
        enc.add_grain(local_id, &empty_grain()),
        Err(Error::Io(_))
    ));
    // Every call afterwards reports the stored failure.
    assert!(matches!(
        enc.add_grain(local_id, &empty_grain()),
        Err(Error::EncoderState(_))
    ));
    assert!(matches!(enc.end(), Err(Error::EncoderState(_))));
}

#[test]
fn test_overlong_tag_rejected() {
    let mut enc = GsfEncoder::streaming(Vec::new());
    let long = "x".repeat(70_000);
    assert!(matches!(
        enc.add_file_tag("key", long),
        Err(Error::ValueOutOfRange(_))
    ));
}
