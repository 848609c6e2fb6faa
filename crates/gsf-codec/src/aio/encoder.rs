//! Async GSF encoder.
//!
//! Same Open → Started → Closed | Failed machine as the blocking encoder;
//! every raw write is an await point. Grain writes are serialized by the
//! exclusive borrow: one `add_grain` completes before the next begins,
//! whatever segment it targets.

use super::sink::{AsyncGsfSink, AsyncSeekableSink, AsyncStreamSink};
use crate::encoder::{validate_tag, SegmentState};
use crate::ssb::{wire, FILE_HEADER_SIZE, GSF_MAJOR_VERSION, GSF_MINOR_VERSION};
use gsf_core::{DateTime, Error, Grain, Result};
use tokio::io::{AsyncSeek, AsyncWrite};
use tracing::{debug, warn};
use uuid::Uuid;

enum State {
    Open,
    Started,
    Closed,
    Failed(String),
}

/// Progressive async encoder for a single GSF stream.
pub struct AsyncGsfEncoder<S> {
    sink: S,
    state: State,
    id: Uuid,
    created: DateTime,
    file_tags: Vec<(String, String)>,
    segments: Vec<SegmentState>,
    next_local: u16,
    pos: u64,
}

impl<S: AsyncGsfSink> AsyncGsfEncoder<S> {
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

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

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

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        match self.sink.write_all(data).await {
            Ok(()) => {
                self.pos += data.len() as u64;
                Ok(())
            }
            Err(e) => Err(self.fail(Error::Io(e))),
        }
    }

    /// Declares a segment. Only callable before `start()`.
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

    /// Attaches a key/value tag to the file. Only callable before
    /// `start()`.
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

    /// Writes the file header and the `head` block.
    pub async fn start(&mut self) -> Result<()> {
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

        self.write(&file_header).await?;
        for (segment, rel) in self.segments.iter_mut().zip(count_offsets) {
            segment.count_pos = Some(FILE_HEADER_SIZE + rel);
        }
        let head = head.freeze();
        self.write(&head).await?;

        debug!(segments = self.segments.len(), "wrote stream head");
        self.state = State::Started;
        Ok(())
    }

    /// Serialises one grain into the named segment.
    pub async fn add_grain(&mut self, local_id: u16, grain: &Grain) -> Result<()> {
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
        self.write(&block).await?;
        self.segments[index].written += 1;
        Ok(())
    }

    /// Writes the terminator and back-patches counts when the sink can
    /// seek.
    pub async fn end(&mut self) -> Result<()> {
        if let State::Failed(msg) = &self.state {
            let msg = msg.clone();
            let _ = self.sink.write_all(&wire::encode_terminator()).await;
            let _ = self.sink.flush().await;
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

        self.write(&wire::encode_terminator()).await?;

        for index in 0..self.segments.len() {
            let Some(count_pos) = self.segments[index].count_pos else {
                continue;
            };
            let count = self.segments[index].written;
            match self.sink.patch_at(count_pos, &count.to_le_bytes()).await {
                Ok(true) => {
                    debug!(
                        local_id = self.segments[index].local_id,
                        count, "back-patched segment count"
                    );
                }
                Ok(false) => {
                    debug!(
                        local_id = self.segments[index].local_id,
                        "sink cannot seek; segment count stays unknown"
                    );
                }
                Err(e) => return Err(self.fail(Error::Io(e))),
            }
        }

        if let Err(e) = self.sink.flush().await {
            return Err(self.fail(Error::Io(e)));
        }
        self.state = State::Closed;
        Ok(())
    }

    pub fn grains_written(&self, local_id: u16) -> Option<i64> {
        self.segments
            .iter()
            .find(|s| s.local_id == local_id)
            .map(|s| s.written)
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}

impl<W: AsyncWrite + AsyncSeek + Unpin + Send> AsyncGsfEncoder<AsyncSeekableSink<W>> {
    /// Encoder over a seekable async target.
    pub fn seekable(target: W) -> Self {
        Self::new(AsyncSeekableSink::new(target))
    }
}

impl<W: AsyncWrite + Unpin + Send> AsyncGsfEncoder<AsyncStreamSink<W>> {
    /// Encoder over a forward-only async target.
    pub fn streaming(target: W) -> Self {
        Self::new(AsyncStreamSink::new(target))
    }
}
