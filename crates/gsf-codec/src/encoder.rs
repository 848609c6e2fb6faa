//! Blocking GSF encoder.
//!
//! ## State machine
//!
//! ```text
//! Open ──start()──> Started ──end()──> Closed
//!   │                  │
//!   └── segments and tags may be added here only
//!                      │
//!                 (write error)
//!                      ▼
//!                   Failed  (sticky: every later call returns the error)
//! ```
//!
//! While Open, segments and tags accumulate in memory. `start()` writes the
//! file header and the `head` block, recording where each segment's count
//! field landed. From then on every `add_grain` serialises a complete
//! `grai` block straight to the sink; the grain is not retained. `end()`
//! writes the size-zero terminator and, when the sink can seek, rewinds to
//! overwrite each count with the number of grains actually written. On a
//! forward-only sink the counts stay at -1, which readers treat as
//! "unknown".

use crate::ssb::{
    wire, GsfSink, SeekableSink, StreamSink, FILE_HEADER_SIZE, GSF_MAJOR_VERSION,
    GSF_MINOR_VERSION,
};
use gsf_core::{DateTime, Error, Grain, Result};
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) struct SegmentState {
    pub local_id: u16,
    pub id: Uuid,
    pub tags: Vec<(String, String)>,
    /// Grains written so far.
    pub written: i64,
    /// Absolute offset of the count field, known once started.
    pub count_pos: Option<u64>,
}

enum State {
    Open,
    Started,
    Closed,
    /// A write failed part-way; the message describes the original error.
    Failed(String),
}

/// Progressive encoder for a single GSF stream.
pub struct GsfEncoder<S> {
    sink: S,
    state: State,
    id: Uuid,
    created: DateTime,
    file_tags: Vec<(String, String)>,
    segments: Vec<SegmentState>,
    next_local: u16,
    /// Bytes written to the sink so far.
    pos: u64,
}

impl<S: GsfSink> GsfEncoder<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: State::Open,
            id: Uuid::new_v4(),
            created: DateTime::new(1970, 1, 1, 0, 0, 0),
            file_tags: Vec::new(),
            segments: Vec::new(),
            next_local: 1,
            pos: 0,
        }
    }

    /// Sets the file id written to the `head` block.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Sets the file creation time written to the `head` block.
    pub fn with_created(mut self, created: DateTime) -> Self {
        self.created = created;
        self
    }

    fn check_failed(&self) -> Result<()> {
        if let State::Failed(msg) = &self.state {
            return Err(Error::EncoderState(format!(
                "encoder previously failed: {}",
                msg
            )));
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(error = %err, "encoder entering failed state");
        self.state = State::Failed(err.to_string());
        err
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        match self.sink.write_all(data) {
            Ok(()) => {
                self.pos += data.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.fail(Error::Io(e))),
        }
    }

    /// Declares a segment. Only callable before `start()`.
    ///
    /// `local_id` defaults to the next free id starting at 1; `id` defaults
    /// to a fresh random UUID. Returns the local id in use.
    pub fn add_segment(
        &mut self,
        local_id: Option<u16>,
        id: Option<Uuid>,
        tags: Vec<(String, String)>,
    ) -> Result<u16> {
        self.check_failed()?;
        if !matches!(self.state, State::Open) {
            return Err(Error::EncoderState(
                "cannot add a segment after start()".to_string(),
            ));
        }
        let local_id = local_id.unwrap_or(self.next_local);
        if self.segments.iter().any(|s| s.local_id == local_id) {
            return Err(Error::DuplicateLocalId(local_id));
        }
        if local_id >= self.next_local {
            self.next_local = local_id + 1;
        }
        for (key, val) in &tags {
            validate_tag(key, val)?;
        }
        self.segments.push(SegmentState {
            local_id,
            id: id.unwrap_or_else(Uuid::new_v4),
            tags,
            written: 0,
            count_pos: None,
        });
        Ok(local_id)
    }

    /// Attaches a key/value tag to the file. Only callable before `start()`.
    pub fn add_file_tag(&mut self, key: impl Into<String>, val: impl Into<String>) -> Result<()> {
        self.check_failed()?;
        if !matches!(self.state, State::Open) {
            return Err(Error::EncoderState(
                "cannot add a file tag after start()".to_string(),
            ));
        }
        let (key, val) = (key.into(), val.into());
        validate_tag(&key, &val)?;
        self.file_tags.push((key, val));
        Ok(())
    }

    /// Attaches a key/value tag to a declared segment. Only callable before
    /// `start()`.
    pub fn add_segment_tag(
        &mut self,
        local_id: u16,
        key: impl Into<String>,
        val: impl Into<String>,
    ) -> Result<()> {
        self.check_failed()?;
        if !matches!(self.state, State::Open) {
            return Err(Error::EncoderState(
                "cannot add a segment tag after start()".to_string(),
            ));
        }
        let (key, val) = (key.into(), val.into());
        validate_tag(&key, &val)?;
        let segment = self
            .segments
            .iter_mut()
            .find(|s| s.local_id == local_id)
            .ok_or(Error::UnknownLocalId(local_id))?;
        segment.tags.push((key, val));
        Ok(())
    }

    /// Writes the file header and the `head` block. A stream with no
    /// declared segments gets a single default segment.
    pub fn start(&mut self) -> Result<()> {
        self.check_failed()?;
        if !matches!(self.state, State::Open) {
            return Err(Error::EncoderState("start() called twice".to_string()));
        }
        if self.segments.is_empty() {
            self.add_segment(None, None, Vec::new())?;
        }

        let file_header = wire::encode_file_header(GSF_MAJOR_VERSION, GSF_MINOR_VERSION);

        let head_segments: Vec<wire::HeadSegment<'_>> = self
            .segments
            .iter()
            .map(|s| wire::HeadSegment {
                local_id: s.local_id,
                id: s.id,
                count: -1,
                tags: &s.tags,
            })
            .collect();
        let (head, count_offsets) =
            wire::encode_head(self.id, &self.created, &head_segments, &self.file_tags)?;
        drop(head_segments);

        self.write(&file_header)?;
        for (segment, rel) in self.segments.iter_mut().zip(count_offsets) {
            segment.count_pos = Some(FILE_HEADER_SIZE + rel);
        }
        let head = head.freeze();
        self.write(&head)?;

        debug!(segments = self.segments.len(), "wrote stream head");
        self.state = State::Started;
        Ok(())
    }

    /// Serialises one grain into the named segment. The grain is written
    /// immediately and not retained.
    pub fn add_grain(&mut self, local_id: u16, grain: &Grain) -> Result<()> {
        self.check_failed()?;
        if !matches!(self.state, State::Started) {
            return Err(Error::EncoderState(
                "add_grain() requires a started encoder".to_string(),
            ));
        }
        let index = self
            .segments
            .iter()
            .position(|s| s.local_id == local_id)
            .ok_or(Error::UnknownLocalId(local_id))?;

        let block = wire::encode_grain(local_id, grain)?;
        self.write(&block)?;
        self.segments[index].written += 1;
        Ok(())
    }

    /// Writes the terminator and back-patches segment counts when the sink
    /// can seek. Leaves the encoder Closed.
    ///
    /// On an already Failed encoder this still appends a terminator on a
    /// best-effort basis, then returns the stored error.
    pub fn end(&mut self) -> Result<()> {
        if let State::Failed(msg) = &self.state {
            let msg = msg.clone();
            let _ = self.sink.write_all(&wire::encode_terminator());
            let _ = self.sink.flush();
            return Err(Error::EncoderState(format!(
                "encoder previously failed: {}",
                msg
            )));
        }
        if !matches!(self.state, State::Started) {
            return Err(Error::EncoderState(
                "end() requires a started encoder".to_string(),
            ));
        }

        self.write(&wire::encode_terminator())?;

        for segment in &self.segments {
            let Some(count_pos) = segment.count_pos else {
                continue;
            };
            match self.sink.patch_at(count_pos, &segment.written.to_le_bytes()) {
                Ok(true) => {
                    debug!(
                        local_id = segment.local_id,
                        count = segment.written,
                        "back-patched segment count"
                    );
                }
                Ok(false) => {
                    debug!(
                        local_id = segment.local_id,
                        "sink cannot seek; segment count stays unknown"
                    );
                }
                Err(e) => return Err(self.fail(Error::Io(e))),
            }
        }

        if let Err(e) = self.sink.flush() {
            return Err(self.fail(Error::Io(e)));
        }
        self.state = State::Closed;
        Ok(())
    }

    /// Number of grains written to a segment so far.
    pub fn grains_written(&self, local_id: u16) -> Option<i64> {
        self.segments
            .iter()
            .find(|s| s.local_id == local_id)
            .map(|s| s.written)
    }

    /// Consumes the encoder and returns the sink.
    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<W: std::io::Write + std::io::Seek> GsfEncoder<SeekableSink<W>> {
    /// Encoder over a seekable target; segment counts are back-patched on
    /// `end()`.
    pub fn seekable(target: W) -> Self {
        Self::new(SeekableSink::new(target))
    }
}

impl<W: std::io::Write> GsfEncoder<StreamSink<W>> {
    /// Encoder over a forward-only target; segment counts stay at -1.
    pub fn streaming(target: W) -> Self {
        Self::new(StreamSink::new(target))
    }
}

pub(crate) fn validate_tag(key: &str, val: &str) -> Result<()> {
    for s in [key, val] {
        if s.len() > u16::MAX as usize {
            return Err(Error::ValueOutOfRange(format!(
                "tag string of {} bytes exceeds the 65535 byte limit",
                s.len()
            )));
        }
    }
    Ok(())
}
