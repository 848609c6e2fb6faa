//! `extract_gsf_essence`: dump the raw payload bytes of one segment.

use gsf_codec::{DecodeOptions, GsfDecoder};
use gsf_core::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Concatenates the `grdt` payloads of one segment into `output`.
///
/// With `local_id` unset the file must contain exactly one segment;
/// multi-flow files require an explicit selection.
pub fn extract_essence(input: &Path, output: &Path, local_id: Option<u16>) -> Result<()> {
    let file = BufReader::new(File::open(input)?);
    let mut dec = GsfDecoder::new(file)?;

    let selected = match local_id {
        Some(id) => {
            if dec.file_header().segment(id).is_none() {
                return Err(Error::UnknownLocalId(id));
            }
            id
        }
        None => match dec.file_header().segments.as_slice() {
            [only] => only.local_id,
            segments => {
                return Err(Error::ValueOutOfRange(format!(
                    "file has {} segments; pick one with --local-id",
                    segments.len()
                )))
            }
        },
    };

    let mut sink = BufWriter::new(File::create(output)?);
    let mut grains = 0u64;
    let mut bytes = 0u64;
    for item in dec.grains(DecodeOptions::default().local_ids([selected])) {
        let (_, grain) = item?;
        let data = grain
            .data
            .bytes()
            .expect("eager iteration always materializes data");
        sink.write_all(data)?;
        grains += 1;
        bytes += data.len() as u64;
    }
    sink.flush()?;

    info!(segment = selected, grains, bytes, "extracted essence");
    Ok(())
}
