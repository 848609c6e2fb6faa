//! Wraps raw audio essence into a single-segment GSF file, one grain per
//! block of samples.

use clap::Parser;
use gsf_cli::commands::{wrap_audio, WrapAudioConfig};
use gsf_cli::{exit_code, init_tracing};
use gsf_core::CogAudioFormat;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "wrap_audio_in_gsf")]
#[command(about = "Wrap raw audio essence in a GSF file", long_about = None)]
struct Args {
    /// Raw audio input
    input: PathBuf,

    /// GSF file to write
    output: PathBuf,

    /// Samples per second
    #[arg(long)]
    sample_rate: u32,

    /// Samples carried by each grain
    #[arg(long, default_value_t = 1920)]
    samples_per_grain: u32,

    /// Audio format name (e.g. S16_INTERLEAVED, S24_PLANES)
    #[arg(long, default_value = "S16_INTERLEAVED")]
    format: String,

    /// Channel count
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Source identity; generated when omitted
    #[arg(long)]
    source_id: Option<Uuid>,

    /// Flow identity; generated when omitted
    #[arg(long)]
    flow_id: Option<Uuid>,

    /// Origin timestamp of the first grain, in nanoseconds
    #[arg(long, default_value_t = 0)]
    start_ts: i64,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let format = match CogAudioFormat::from_name(&args.format) {
        Some(format) => format,
        None => {
            eprintln!("error: unknown audio format {:?}", args.format);
            return ExitCode::from(2);
        }
    };

    let config = WrapAudioConfig {
        format,
        channels: args.channels,
        sample_rate: args.sample_rate,
        samples_per_grain: args.samples_per_grain,
        source_id: args.source_id,
        flow_id: args.flow_id,
        start_ns: args.start_ts as i128,
    };
    exit_code(wrap_audio(&args.input, &args.output, &config))
}
