//! Wraps raw video essence into a single-segment GSF file, one grain per
//! frame.

use clap::Parser;
use gsf_cli::commands::{wrap_video, WrapVideoConfig};
use gsf_cli::{exit_code, init_tracing};
use gsf_core::{CogFrameFormat, Rational};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "wrap_video_in_gsf")]
#[command(about = "Wrap raw video essence in a GSF file", long_about = None)]
struct Args {
    /// Raw video input
    input: PathBuf,

    /// GSF file to write
    output: PathBuf,

    /// Frame geometry as WxH
    #[arg(long, default_value = "1920x1080")]
    size: String,

    /// Frame format name (e.g. U8_422, S16_422_10BIT)
    #[arg(long, default_value = "S16_422_10BIT")]
    format: String,

    /// Frame rate as N or N/D
    #[arg(long, default_value = "25")]
    rate: Rational,

    /// Source identity; generated when omitted
    #[arg(long)]
    source_id: Option<Uuid>,

    /// Flow identity; generated when omitted
    #[arg(long)]
    flow_id: Option<Uuid>,

    /// Origin timestamp of the first frame, in nanoseconds
    #[arg(long, default_value_t = 0)]
    start_ts: i64,
}

fn parse_size(size: &str) -> Result<(u32, u32), String> {
    let (w, h) = size
        .split_once('x')
        .ok_or_else(|| format!("size {:?} is not WxH", size))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("size {:?}: {}", size, e))
    };
    Ok((parse(w)?, parse(h)?))
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let (width, height) = match parse_size(&args.size) {
        Ok(dims) => dims,
        Err(msg) => {
            eprintln!("error: {}", msg);
            return ExitCode::from(2);
        }
    };
    let format = match CogFrameFormat::from_name(&args.format) {
        Some(format) => format,
        None => {
            eprintln!("error: unknown frame format {:?}", args.format);
            return ExitCode::from(2);
        }
    };

    let config = WrapVideoConfig {
        width,
        height,
        format,
        rate: args.rate,
        source_id: args.source_id,
        flow_id: args.flow_id,
        start_ns: args.start_ts as i128,
    };
    exit_code(wrap_video(&args.input, &args.output, &config))
}
