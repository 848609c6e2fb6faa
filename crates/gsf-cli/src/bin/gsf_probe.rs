//! Prints a summary of a GSF file: identity, segments, tags and grain
//! tallies.

use clap::Parser;
use gsf_cli::commands::probe;
use gsf_cli::{exit_code, init_tracing};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gsf_probe")]
#[command(about = "Summarise the contents of a GSF file", long_about = None)]
struct Args {
    /// GSF file to inspect
    file: PathBuf,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    exit_code(probe(&args.file).map(|report| {
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).expect("report serialises")
            );
        } else {
            print!("{}", report.render());
        }
    }))
}
