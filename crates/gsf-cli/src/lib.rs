//! Command-line tools over the GSF codec.
//!
//! Four thin binaries share the command implementations in this library:
//!
//! - `gsf_probe <file>`: summarise a file's id, segments, tags and grain
//!   tallies. Exit code 0 on success, 1 on I/O failure, 2 on a malformed
//!   file.
//! - `extract_gsf_essence <in> <out>`: concatenate the grain payloads of
//!   one segment into a raw essence file.
//! - `wrap_video_in_gsf <in> <out>`: frame raw video bytes into grains.
//! - `wrap_audio_in_gsf <in> <out>`: frame raw audio samples into grains.

pub mod commands;

use gsf_core::Error;
use std::process::ExitCode;

/// Initialises logging for the binaries. Verbosity comes from `RUST_LOG`,
/// defaulting to warnings only.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Maps a command result onto the documented exit codes: 0 success, 1 for
/// I/O failures, 2 for malformed or unusable input.
pub fn exit_code(result: Result<(), Error>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            match err {
                Error::Io(_) => ExitCode::from(1),
                _ => ExitCode::from(2),
            }
        }
    }
}
