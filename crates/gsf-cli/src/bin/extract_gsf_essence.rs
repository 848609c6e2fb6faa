//! Writes the concatenated grain payloads of one segment to a raw
//! essence file.

use clap::Parser;
use gsf_cli::commands::extract_essence;
use gsf_cli::{exit_code, init_tracing};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "extract_gsf_essence")]
#[command(about = "Extract raw essence from a GSF file", long_about = None)]
struct Args {
    /// GSF file to read
    input: PathBuf,

    /// Raw essence file to write
    output: PathBuf,

    /// Segment to extract; required when the file holds several flows
    #[arg(long)]
    local_id: Option<u16>,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    exit_code(extract_essence(&args.input, &args.output, args.local_id))
}
