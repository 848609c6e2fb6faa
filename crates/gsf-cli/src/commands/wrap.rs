//! `wrap_video_in_gsf` and `wrap_audio_in_gsf`: frame raw essence into a
//! single-segment GSF file.

use bytes::Bytes;
use gsf_codec::{GsfEncoder, GsfSink};
use gsf_core::{
    CogAudioFormat, CogFrameFormat, CogFrameLayout, Error, Grain, GrainTimestamp, Rational,
    Result,
};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

pub struct WrapVideoConfig {
    pub width: u32,
    pub height: u32,
    pub format: CogFrameFormat,
    pub rate: Rational,
    pub source_id: Option<Uuid>,
    pub flow_id: Option<Uuid>,
    /// Origin timestamp of the first grain, in nanoseconds.
    pub start_ns: i128,
}

pub struct WrapAudioConfig {
    pub format: CogAudioFormat,
    pub channels: u16,
    pub sample_rate: u32,
    pub samples_per_grain: u32,
    pub source_id: Option<Uuid>,
    pub flow_id: Option<Uuid>,
    pub start_ns: i128,
}

/// Origin timestamp of grain `n` at the given cadence, computed from the
/// start time so rounding never accumulates.
fn grain_timestamp(start_ns: i128, index: u64, rate: &Rational) -> GrainTimestamp {
    let step = index as i128 * rate.denominator as i128 * 1_000_000_000 / rate.numerator as i128;
    GrainTimestamp::from_nanos(start_ns + step)
}

fn frame_loop<R, S, F>(
    mut input: R,
    enc: &mut GsfEncoder<S>,
    local_id: u16,
    frame_size: usize,
    mut grain_for_frame: F,
) -> Result<u64>
where
    R: Read,
    S: GsfSink,
    F: FnMut(u64, Bytes) -> Grain,
{
    let mut written = 0u64;
    loop {
        let mut frame = vec![0u8; frame_size];
        let mut filled = 0;
        while filled < frame_size {
            let n = input.read(&mut frame[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        if filled < frame_size {
            warn!(filled, frame_size, "dropping trailing partial frame");
            break;
        }
        let grain = grain_for_frame(written, Bytes::from(frame));
        enc.add_grain(local_id, &grain)?;
        written += 1;
    }
    Ok(written)
}

/// Wraps raw video frames into one grain each.
pub fn wrap_video(input: &Path, output: &Path, config: &WrapVideoConfig) -> Result<()> {
    if config.rate.is_null() {
        return Err(Error::ValueOutOfRange(format!(
            "frame rate {} is not usable",
            config.rate
        )));
    }

    let source_id = config.source_id.unwrap_or_else(Uuid::new_v4);
    let flow_id = config.flow_id.unwrap_or_else(Uuid::new_v4);

    let template = Grain::video(
        source_id,
        flow_id,
        GrainTimestamp::from_nanos(config.start_ns),
        config.format,
        CogFrameLayout::FULL_FRAME,
        config.width,
        config.height,
    );
    let frame_size = template
        .expected_data_length()
        .expect("video grains declare a length") as usize;
    if frame_size == 0 {
        return Err(Error::ValueOutOfRange(format!(
            "format {} has no raw frame geometry",
            config.format.name()
        )));
    }

    let reader = BufReader::new(File::open(input)?);
    let mut enc = GsfEncoder::seekable(BufWriter::new(File::create(output)?));
    let local_id = enc.add_segment(None, Some(flow_id), Vec::new())?;
    enc.start()?;

    let rate = config.rate;
    let duration = rate.invert();
    let start_ns = config.start_ns;
    let frames = frame_loop(reader, &mut enc, local_id, frame_size, |index, data| {
        let mut grain = template.clone();
        let ts = grain_timestamp(start_ns, index, &rate);
        grain.header.origin_timestamp = ts;
        grain.header.sync_timestamp = ts;
        grain.header.rate = rate;
        grain.header.duration = duration;
        grain.set_data(data);
        grain
    })?;
    enc.end()?;

    info!(frames, frame_size, "wrapped video essence");
    Ok(())
}

/// Wraps raw audio samples into fixed-size grains.
pub fn wrap_audio(input: &Path, output: &Path, config: &WrapAudioConfig) -> Result<()> {
    if config.sample_rate == 0 || config.samples_per_grain == 0 || config.channels == 0 {
        return Err(Error::ValueOutOfRange(
            "sample rate, channels and samples per grain must be non-zero".to_string(),
        ));
    }

    let source_id = config.source_id.unwrap_or_else(Uuid::new_v4);
    let flow_id = config.flow_id.unwrap_or_else(Uuid::new_v4);

    let template = Grain::audio(
        source_id,
        flow_id,
        GrainTimestamp::from_nanos(config.start_ns),
        config.format,
        config.channels,
        config.samples_per_grain,
        config.sample_rate,
    );
    let frame_size = template.length() as usize;
    if frame_size == 0 {
        return Err(Error::ValueOutOfRange(format!(
            "format {} has no raw sample geometry",
            config.format.name()
        )));
    }

    // One grain per block of samples; the cadence follows from the sample
    // rate.
    let rate = Rational::new(config.sample_rate, config.samples_per_grain);
    let duration = rate.invert();

    let reader = BufReader::new(File::open(input)?);
    let mut enc = GsfEncoder::seekable(BufWriter::new(File::create(output)?));
    let local_id = enc.add_segment(None, Some(flow_id), Vec::new())?;
    enc.start()?;

    let start_ns = config.start_ns;
    let grains = frame_loop(reader, &mut enc, local_id, frame_size, |index, data| {
        let mut grain = template.clone();
        let ts = grain_timestamp(start_ns, index, &rate);
        grain.header.origin_timestamp = ts;
        grain.header.sync_timestamp = ts;
        grain.header.rate = rate;
        grain.header.duration = duration;
        grain.set_data(data);
        grain
    })?;
    enc.end()?;

    info!(grains, frame_size, "wrapped audio essence");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{extract_essence, probe};
    use gsf_codec::GsfDecoder;
    use std::io::Write;

    fn write_temp(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        path
    }

    #[test]
    fn test_wrap_video_probe_extract_cycle() {
        let dir = tempfile::tempdir().unwrap();

        // Three 16x2 U8_422 frames of distinct fill bytes.
        let mut raw = Vec::new();
        for n in 0..3u8 {
            raw.extend(std::iter::repeat(n).take(64));
        }
        let input = write_temp(&dir, "frames.raw", &raw);
        let gsf = dir.path().join("out.gsf");

        let config = WrapVideoConfig {
            width: 16,
            height: 2,
            format: CogFrameFormat::U8_422,
            rate: Rational::new(25, 1),
            source_id: None,
            flow_id: None,
            start_ns: 0,
        };
        wrap_video(&input, &gsf, &config).unwrap();

        // Probe sees one segment of three video grains.
        let report = probe(&gsf).unwrap();
        assert_eq!(report.segments.len(), 1);
        assert_eq!(report.segments[0].declared_count, 3);
        assert_eq!(report.segments[0].observed_count, 3);
        assert_eq!(report.grain_counts["video"], 3);

        // Timestamps step at 1/25s.
        let (_, grains) = GsfDecoder::decode_all(File::open(&gsf).unwrap()).unwrap();
        let grains = &grains[&1];
        assert_eq!(grains[0].header.origin_timestamp.as_nanos(), 0);
        assert_eq!(grains[1].header.origin_timestamp.as_nanos(), 40_000_000);
        assert_eq!(grains[2].header.origin_timestamp.as_nanos(), 80_000_000);

        // Extraction reproduces the raw input.
        let essence = dir.path().join("essence.raw");
        extract_essence(&gsf, &essence, None).unwrap();
        assert_eq!(std::fs::read(&essence).unwrap(), raw);
    }

    #[test]
    fn test_wrap_video_drops_partial_frame() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_temp(&dir, "frames.raw", &vec![7u8; 64 + 10]);
        let gsf = dir.path().join("out.gsf");

        let config = WrapVideoConfig {
            width: 16,
            height: 2,
            format: CogFrameFormat::U8_422,
            rate: Rational::new(25, 1),
            source_id: None,
            flow_id: None,
            start_ns: 0,
        };
        wrap_video(&input, &gsf, &config).unwrap();
        let report = probe(&gsf).unwrap();
        assert_eq!(report.segments[0].observed_count, 1);
    }

    #[test]
    fn test_wrap_audio_cadence() {
        let dir = tempfile::tempdir().unwrap();
        // Two grains of 480 samples, 2 channels, 16 bit.
        let input = write_temp(&dir, "samples.raw", &vec![1u8; 480 * 2 * 2 * 2]);
        let gsf = dir.path().join("out.gsf");

        let config = WrapAudioConfig {
            format: CogAudioFormat::S16_INTERLEAVED,
            channels: 2,
            sample_rate: 48000,
            samples_per_grain: 480,
            source_id: None,
            flow_id: None,
            start_ns: 0,
        };
        wrap_audio(&input, &gsf, &config).unwrap();

        let (_, grains) = GsfDecoder::decode_all(File::open(&gsf).unwrap()).unwrap();
        let grains = &grains[&1];
        assert_eq!(grains.len(), 2);
        // 480 samples at 48kHz is 10ms per grain.
        assert_eq!(grains[1].header.origin_timestamp.as_nanos(), 10_000_000);
        match &grains[0].payload {
            gsf_core::GrainPayload::Audio(audio) => {
                assert_eq!(audio.samples, 480);
                assert_eq!(audio.sample_rate, 48000);
            }
            other => panic!("expected audio, got {:?}", other.grain_type()),
        }
    }

    #[test]
    fn test_extract_requires_selection_for_multi_segment() {
        let dir = tempfile::tempdir().unwrap();
        let gsf = dir.path().join("multi.gsf");

        let mut enc = GsfEncoder::seekable(File::create(&gsf).unwrap());
        enc.add_segment(Some(1), None, vec![]).unwrap();
        enc.add_segment(Some(2), None, vec![]).unwrap();
        enc.start().unwrap();
        let grain = Grain::empty(Uuid::new_v4(), Uuid::new_v4(), GrainTimestamp::zero());
        enc.add_grain(1, &grain).unwrap();
        enc.add_grain(2, &grain).unwrap();
        enc.end().unwrap();

        let out = dir.path().join("essence.raw");
        assert!(extract_essence(&gsf, &out, None).is_err());
        assert!(extract_essence(&gsf, &out, Some(3)).is_err());
        extract_essence(&gsf, &out, Some(2)).unwrap();
    }
}
