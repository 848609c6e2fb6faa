//! Blocking GSF decoder.
//!
//! ## Session model
//!
//! A [`GsfDecoder`] binds to one `Read + Seek` source for its lifetime.
//! Construction reads and validates the file header and the `head` block;
//! afterwards [`GsfDecoder::grains`] hands out a pull iterator over the
//! `grai` blocks. The decoder is strictly single-context: one iteration at
//! a time, grains yielded in file order.
//!
//! ## Loading modes
//!
//! With [`DecodeOptions::skip_data`] the iterator seeks over every `grdt`
//! payload and yields grains holding lazy `(offset, length)` handles. The
//! handles stay valid as long as the decoder is open and resolve through
//! [`GsfDecoder::load_data`], but only once the grain loop has finished;
//! resolving mid-iteration would seek the shared reader out from under the
//! loop, so it returns [`Error::DecoderBusy`] instead.
//!
//! ## Error posture
//!
//! Decoding never recovers past a malformed block inside a `grai`: size
//! fields are the only framing, so the stream is considered poisoned and
//! the error is final. Unknown block tags, on the other hand, are skipped
//! by exact payload length at every level.

use crate::ssb::{
    require_gsf_file_type, tag_str, wire, BlockHeader, BlockReader, GSF_LEGACY_MAJOR_VERSION,
    GSF_MAJOR_VERSION, TAG_GBHD, TAG_GRAI, TAG_GRDT, TAG_HEAD,
};
use gsf_core::{Error, FileHeader, Grain, GrainData, LazyData, Result};
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Options controlling grain iteration.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Seek over payloads and yield lazy data handles.
    pub skip_data: bool,
    /// Yield only grains belonging to these segments.
    pub local_ids: Option<HashSet<u16>>,
    /// Require a terminator and declared segments for every grain.
    pub strict: bool,
}

impl DecodeOptions {
    pub fn skip_data(mut self, skip: bool) -> Self {
        self.skip_data = skip;
        self
    }

    pub fn local_ids(mut self, ids: impl IntoIterator<Item = u16>) -> Self {
        self.local_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A decode session over one GSF stream.
pub struct GsfDecoder<R> {
    reader: BlockReader<R>,
    file_header: FileHeader,
    major: u16,
    minor: u16,
    /// Set once the grain loop has reached the terminator or a clean EOF.
    iteration_done: bool,
    /// Whether the explicit terminator block was seen.
    saw_terminator: bool,
}

impl<R: Read + Seek> GsfDecoder<R> {
    /// Opens a decode session: validates the file header and decodes the
    /// `head` block.
    pub fn new(source: R) -> Result<Self> {
        let mut reader = BlockReader::new(source)?;
        let (file_type, major, minor) = reader.read_file_header()?;
        require_gsf_file_type(file_type)?;
        if major != GSF_MAJOR_VERSION && major != GSF_LEGACY_MAJOR_VERSION {
            return Err(Error::UnsupportedMajorVersion { major, minor });
        }
        debug!(major, minor, "opened GSF stream");

        // Find the unique head block, skipping anything else.
        let file_header = loop {
            let header = reader.read_block_header()?.ok_or(Error::TruncatedInput)?;
            if header.tag == TAG_HEAD {
                let base = reader.position();
                let payload = reader.read_payload(&header)?;
                break wire::parse_head(&payload, base)?;
            }
            debug!(tag = %tag_str(&header.tag), "skipping block while looking for head");
            reader.seek_past(&header)?;
        };

        Ok(Self {
            reader,
            file_header,
            major,
            minor,
            iteration_done: false,
            saw_terminator: false,
        })
    }

    /// The decoded `head` block contents.
    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    /// The version pair from the SSB file header.
    pub fn version(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    /// Whether the stream ended with the explicit terminator block.
    pub fn saw_terminator(&self) -> bool {
        self.saw_terminator
    }

    /// A pull iterator over the grain blocks.
    pub fn grains(&mut self, options: DecodeOptions) -> GrainIter<'_, R> {
        GrainIter {
            session: self,
            options,
            finished: false,
        }
    }

    /// Resolves a lazy data handle produced by a `skip_data` iteration.
    ///
    /// Only available once grain iteration has finished; the handle's byte
    /// range is read from the source and the grain's data region replaced
    /// with the materialized bytes.
    pub fn load_data(&mut self, grain: &mut Grain) -> Result<()> {
        let lazy = match &grain.data {
            GrainData::Lazy(lazy) => *lazy,
            GrainData::Materialized(_) => return Ok(()),
        };
        if !self.iteration_done {
            return Err(Error::DecoderBusy);
        }
        let data = self.reader.read_at(lazy.offset, lazy.length)?;
        grain.set_data(data);
        Ok(())
    }

    /// Eagerly decodes an entire stream, grouping grains by segment.
    ///
    /// Strict: the terminator must be present, and every grain must name a
    /// declared segment.
    pub fn decode_all(source: R) -> Result<(FileHeader, BTreeMap<u16, Vec<Grain>>)> {
        let mut session = Self::new(source)?;
        let declared: HashSet<u16> = session
            .file_header
            .segments
            .iter()
            .map(|s| s.local_id)
            .collect();

        let mut grains: BTreeMap<u16, Vec<Grain>> = BTreeMap::new();
        let mut iter = session.grains(DecodeOptions::default().strict(true));
        while let Some(item) = iter.next() {
            let (local_id, grain) = item?;
            if !declared.contains(&local_id) {
                return Err(Error::UnknownLocalId(local_id));
            }
            grains.entry(local_id).or_default().push(grain);
        }
        drop(iter);

        if !session.saw_terminator {
            return Err(Error::TruncatedInput);
        }
        Ok((session.file_header, grains))
    }

    /// Decodes one grain block body (everything after the local id).
    fn read_grain_body(
        &mut self,
        grai: &BlockHeader,
        skip_data: bool,
    ) -> Result<Grain> {
        let mut parsed_gbhd = None;
        let mut data: Option<GrainData> = None;

        while self.reader.position() < grai.end() {
            let child = self
                .reader
                .read_block_header()?
                .ok_or(Error::TruncatedInput)?;
            if child.end() > grai.end() {
                return Err(Error::malformed(
                    format!("child block {:?} exceeds its grai parent", tag_str(&child.tag)),
                    child.start,
                ));
            }
            match child.tag {
                TAG_GBHD => {
                    let base = self.reader.position();
                    let payload = self.reader.read_payload(&child)?;
                    parsed_gbhd = Some(wire::parse_gbhd(&payload, base, self.major)?);
                }
                TAG_GRDT => {
                    let length = child.payload_len();
                    if skip_data && length > 0 {
                        data = Some(GrainData::Lazy(LazyData {
                            offset: self.reader.position(),
                            length,
                        }));
                        self.reader.seek_past(&child)?;
                    } else {
                        data = Some(GrainData::Materialized(self.reader.read_payload(&child)?));
                    }
                }
                other => {
                    debug!(tag = %tag_str(&other), "skipping unknown grai child block");
                    self.reader.seek_past(&child)?;
                }
            }
        }

        let (header, payload) = parsed_gbhd.ok_or_else(|| {
            Error::malformed("grai block has no gbhd child", grai.start)
        })?;
        let data = data.ok_or_else(|| {
            Error::malformed("grai block has no grdt child", grai.start)
        })?;

        let grain = Grain::new(header, payload, data);
        if let Some(expected) = grain.expected_data_length() {
            let actual = grain.data.len();
            if expected > actual {
                return Err(Error::TruncatedPayload { expected, actual });
            }
        }
        Ok(grain)
    }
}

/// Pull iterator over `(local_id, Grain)` pairs.
///
/// Ends at the `grai` terminator or at a clean end of stream. Any error is
/// final: the stream offset is unspecified afterwards.
pub struct GrainIter<'a, R> {
    session: &'a mut GsfDecoder<R>,
    options: DecodeOptions,
    finished: bool,
}

impl<R: Read + Seek> GrainIter<'_, R> {
    fn next_grain(&mut self) -> Result<Option<(u16, Grain)>> {
        loop {
            let header = match self.session.reader.read_block_header()? {
                Some(header) => header,
                None => {
                    // Clean EOF without a terminator. Streaming mode
                    // accepts it; strict callers check saw_terminator.
                    self.session.iteration_done = true;
                    if self.options.strict {
                        return Err(Error::TruncatedInput);
                    }
                    warn!("stream ended without a terminator block");
                    return Ok(None);
                }
            };

            if header.tag != TAG_GRAI {
                debug!(tag = %tag_str(&header.tag), "skipping non-grain block");
                self.session.reader.seek_past(&header)?;
                continue;
            }

            // Terminator forms: size field 0, or a bare header with no
            // payload.
            if header.size == 0 || header.payload_len() == 0 {
                self.session.iteration_done = true;
                self.session.saw_terminator = true;
                debug!("reached grain terminator");
                return Ok(None);
            }
            if header.payload_len() < 2 {
                return Err(Error::malformed(
                    "grai block too small for a local id",
                    header.start,
                ));
            }

            let mut local_id_raw = [0u8; 2];
            let payload = self.session.reader.read_bytes(2)?;
            local_id_raw.copy_from_slice(&payload);
            let local_id = u16::from_le_bytes(local_id_raw);

            if let Some(wanted) = &self.options.local_ids {
                if !wanted.contains(&local_id) {
                    self.session.reader.seek_past(&header)?;
                    continue;
                }
            }

            let grain = self
                .session
                .read_grain_body(&header, self.options.skip_data)?;
            return Ok(Some((local_id, grain)));
        }
    }
}

impl<R: Read + Seek> Iterator for GrainIter<'_, R> {
    type Item = Result<(u16, Grain)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_grain() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                self.session.iteration_done = true;
                Some(Err(err))
            }
        }
    }
}
