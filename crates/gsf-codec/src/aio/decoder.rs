//! Async GSF decoder.
//!
//! Shape-for-shape mirror of the blocking decoder: open a session with
//! [`AsyncGsfDecoder::new`], pull grains with [`AsyncGrainIter::next`],
//! resolve lazy handles with [`AsyncGsfDecoder::load_data`] once iteration
//! has finished.

use super::read::AsyncBlockReader;
use crate::decoder::DecodeOptions;
use crate::ssb::{
    require_gsf_file_type, tag_str, wire, BlockHeader, GSF_LEGACY_MAJOR_VERSION,
    GSF_MAJOR_VERSION, TAG_GBHD, TAG_GRAI, TAG_GRDT, TAG_HEAD,
};
use gsf_core::{Error, FileHeader, Grain, GrainData, LazyData, Result};
use std::collections::{BTreeMap, HashSet};
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::{debug, warn};

/// An async decode session over one GSF stream.
pub struct AsyncGsfDecoder<R> {
    reader: AsyncBlockReader<R>,
    file_header: FileHeader,
    major: u16,
    minor: u16,
    iteration_done: bool,
    saw_terminator: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin> AsyncGsfDecoder<R> {
    /// Opens a decode session: validates the file header and decodes the
    /// `head` block.
    pub async fn new(source: R) -> Result<Self> {
        let mut reader = AsyncBlockReader::new(source).await?;
        let (file_type, major, minor) = reader.read_file_header().await?;
        require_gsf_file_type(file_type)?;
        if major != GSF_MAJOR_VERSION && major != GSF_LEGACY_MAJOR_VERSION {
            return Err(Error::UnsupportedMajorVersion { major, minor });
        }
        debug!(major, minor, "opened GSF stream");

        let file_header = loop {
            let header = reader
                .read_block_header()
                .await?
                .ok_or(Error::TruncatedInput)?;
            if header.tag == TAG_HEAD {
                let base = reader.position();
                let payload = reader.read_payload(&header).await?;
                break wire::parse_head(&payload, base)?;
            }
            debug!(tag = %tag_str(&header.tag), "skipping block while looking for head");
            reader.seek_past(&header).await?;
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

    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    pub fn version(&self) -> (u16, u16) {
        (self.major, self.minor)
    }

    pub fn saw_terminator(&self) -> bool {
        self.saw_terminator
    }

    /// A pull iterator over the grain blocks.
    pub fn grains(&mut self, options: DecodeOptions) -> AsyncGrainIter<'_, R> {
        AsyncGrainIter {
            session: self,
            options,
            finished: false,
        }
    }

    /// Resolves a lazy data handle; only available once grain iteration
    /// has finished.
    pub async fn load_data(&mut self, grain: &mut Grain) -> Result<()> {
        let lazy = match &grain.data {
            GrainData::Lazy(lazy) => *lazy,
            GrainData::Materialized(_) => return Ok(()),
        };
        if !self.iteration_done {
            return Err(Error::DecoderBusy);
        }
        let data = self.reader.read_at(lazy.offset, lazy.length).await?;
        grain.set_data(data);
        Ok(())
    }

    /// Eagerly decodes an entire stream, grouping grains by segment.
    pub async fn decode_all(source: R) -> Result<(FileHeader, BTreeMap<u16, Vec<Grain>>)> {
        let mut session = Self::new(source).await?;
        let declared: HashSet<u16> = session
            .file_header
            .segments
            .iter()
            .map(|s| s.local_id)
            .collect();

        let mut grains: BTreeMap<u16, Vec<Grain>> = BTreeMap::new();
        let mut iter = session.grains(DecodeOptions::default().strict(true));
        while let Some(item) = iter.next().await {
            let (local_id, grain) = item?;
            if !declared.contains(&local_id) {
                return Err(Error::UnknownLocalId(local_id));
            }
            grains.entry(local_id).or_default().push(grain);
        }

        if !session.saw_terminator {
            return Err(Error::TruncatedInput);
        }
        Ok((session.file_header, grains))
    }

    async fn read_grain_body(&mut self, grai: &BlockHeader, skip_data: bool) -> Result<Grain> {
        let mut parsed_gbhd = None;
        let mut data: Option<GrainData> = None;

        while self.reader.position() < grai.end() {
            let child = self
                .reader
                .read_block_header()
                .await?
                .ok_or(Error::TruncatedInput)?;
            if child.end() > grai.end() {
                return Err(Error::malformed(
                    format!(
                        "child block {:?} exceeds its grai parent",
                        tag_str(&child.tag)
                    ),
                    child.start,
                ));
            }
            match child.tag {
                TAG_GBHD => {
                    let base = self.reader.position();
                    let payload = self.reader.read_payload(&child).await?;
                    parsed_gbhd = Some(wire::parse_gbhd(&payload, base, self.major)?);
                }
                TAG_GRDT => {
                    let length = child.payload_len();
                    if skip_data && length > 0 {
                        data = Some(GrainData::Lazy(LazyData {
                            offset: self.reader.position(),
                            length,
                        }));
                        self.reader.seek_past(&child).await?;
                    } else {
                        data = Some(GrainData::Materialized(
                            self.reader.read_payload(&child).await?,
                        ));
                    }
                }
                other => {
                    debug!(tag = %tag_str(&other), "skipping unknown grai child block");
                    self.reader.seek_past(&child).await?;
                }
            }
        }

        let (header, payload) = parsed_gbhd
            .ok_or_else(|| Error::malformed("grai block has no gbhd child", grai.start))?;
        let data =
            data.ok_or_else(|| Error::malformed("grai block has no grdt child", grai.start))?;

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

/// Async pull iterator over `(local_id, Grain)` pairs.
pub struct AsyncGrainIter<'a, R> {
    session: &'a mut AsyncGsfDecoder<R>,
    options: DecodeOptions,
    finished: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin> AsyncGrainIter<'_, R> {
    /// The next grain, or `None` at the terminator or a clean end of
    /// stream.
    pub async fn next(&mut self) -> Option<Result<(u16, Grain)>> {
        if self.finished {
            return None;
        }
        match self.next_grain().await {
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

    async fn next_grain(&mut self) -> Result<Option<(u16, Grain)>> {
        loop {
            let header = match self.session.reader.read_block_header().await? {
                Some(header) => header,
                None => {
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
                self.session.reader.seek_past(&header).await?;
                continue;
            }

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

            let payload = self.session.reader.read_bytes(2).await?;
            let local_id = u16::from_le_bytes([payload[0], payload[1]]);

            if let Some(wanted) = &self.options.local_ids {
                if !wanted.contains(&local_id) {
                    self.session.reader.seek_past(&header).await?;
                    continue;
                }
            }

            let grain = self
                .session
                .read_grain_body(&header, self.options.skip_data)
                .await?;
            return Ok(Some((local_id, grain)));
        }
    }
}
