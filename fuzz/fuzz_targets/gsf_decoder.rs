#![no_main]

use gsf_codec::{DecodeOptions, GsfDecoder};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Fuzz the GSF decoder with arbitrary bytes.
    // Tests handling of:
    // - Invalid signatures and file types
    // - Size fields that underflow or cross parent bounds
    // - Truncated block headers and payloads
    // - Unknown tags at every nesting level
    let Ok(mut dec) = GsfDecoder::new(Cursor::new(data.to_vec())) else {
        return;
    };

    // Walk the grains eagerly; any error ends the stream.
    for item in dec.grains(DecodeOptions::default()) {
        if item.is_err() {
            break;
        }
    }

    // A second pass in skip-data mode must also never panic.
    let Ok(mut dec) = GsfDecoder::new(Cursor::new(data.to_vec())) else {
        return;
    };
    for item in dec.grains(DecodeOptions::default().skip_data(true)) {
        if item.is_err() {
            break;
        }
    }
});
