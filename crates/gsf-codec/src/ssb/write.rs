//! Blocking SSB block writer and the output sink abstraction.
//!
//! ## Block writing
//!
//! [`BlockWriter`] assembles nested blocks in an internal buffer. A block's
//! size field is back-patched in the buffer when the block ends, and the
//! buffer is flushed to the sink once the outermost block completes. This
//! way the size-including-header invariant holds without ever rewinding the
//! sink, so unseekable outputs (pipes, sockets) work unchanged.
//!
//! ## Sinks
//!
//! [`GsfSink`] models an output that may or may not support back-patching
//! bytes that were already written. [`SeekableSink`] wraps a `Write + Seek`
//! target and patches in place; [`StreamSink`] wraps a plain `Write` target
//! and reports patching as unsupported, which leaves segment counts at -1.

use super::TAG_FILL;
use bytes::{BufMut, BytesMut};
use gsf_core::{Error, Result};
use std::io::{Seek, SeekFrom, Write};

/// Buffered writer for nested tag/size blocks.
pub struct BlockWriter<W: Write> {
    sink: W,
    buf: BytesMut,
    /// Buffer offsets of the size fields of currently open blocks.
    open: Vec<usize>,
    /// Bytes already flushed to the sink.
    flushed: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            buf: BytesMut::new(),
            open: Vec::new(),
            flushed: 0,
        }
    }

    /// Absolute position the next byte will land at.
    pub fn position(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Opens a block. Content written until the matching [`end_block`]
    /// becomes its payload.
    ///
    /// [`end_block`]: BlockWriter::end_block
    pub fn begin_block(&mut self, tag: [u8; 4]) -> Result<()> {
        self.buf.put_slice(&tag);
        self.open.push(self.buf.len());
        self.buf.put_u32_le(0);
        Ok(())
    }

    /// Closes the innermost open block, patching its size field. When the
    /// outermost block closes, the buffer is flushed to the sink.
    pub fn end_block(&mut self) -> Result<()> {
        let size_off = self.open.pop().ok_or_else(|| {
            Error::EncoderState("end_block() called with no open block".to_string())
        })?;
        let start = size_off - 4;
        let size = self.buf.len() - start;
        if size > u32::MAX as usize {
            return Err(Error::ValueOutOfRange(format!(
                "block of {} bytes exceeds the u32 size field",
                size
            )));
        }
        self.buf[size_off..size_off + 4].copy_from_slice(&(size as u32).to_le_bytes());
        if self.open.is_empty() {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Writes raw bytes, either into the open block or straight through.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.open.is_empty() {
            self.sink.write_all(data)?;
            self.flushed += data.len() as u64;
        } else {
            self.buf.put_slice(data);
        }
        Ok(())
    }

    /// Emits a `fill` block with `n` zero payload bytes.
    pub fn write_fill(&mut self, n: u32) -> Result<()> {
        self.begin_block(TAG_FILL)?;
        let mut remaining = n as usize;
        const ZEROS: [u8; 256] = [0u8; 256];
        while remaining > 0 {
            let chunk = remaining.min(ZEROS.len());
            self.buf.put_slice(&ZEROS[..chunk]);
            remaining -= chunk;
        }
        self.end_block()
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_all(&self.buf)?;
            self.flushed += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Flushes completed blocks and the sink. Open blocks stay buffered.
    pub fn flush(&mut self) -> Result<()> {
        if self.open.is_empty() {
            self.flush_buffer()?;
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Returns the sink. Fails if a block is still open.
    pub fn into_inner(mut self) -> Result<W> {
        if !self.open.is_empty() {
            return Err(Error::EncoderState(format!(
                "{} block(s) still open",
                self.open.len()
            )));
        }
        self.flush_buffer()?;
        Ok(self.sink)
    }
}

/// An encoder output that may support patching already-written bytes.
pub trait GsfSink {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()>;

    /// Overwrites `data.len()` bytes at absolute position `pos`, leaving
    /// the append position unchanged. Returns `false` when the underlying
    /// target cannot seek.
    fn patch_at(&mut self, pos: u64, data: &[u8]) -> std::io::Result<bool>;
}

/// Sink over a seekable target; supports count back-patching.
pub struct SeekableSink<W> {
    inner: W,
}

impl<W: Write + Seek> SeekableSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> GsfSink for SeekableSink<W> {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    fn patch_at(&mut self, pos: u64, data: &[u8]) -> std::io::Result<bool> {
        let saved = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(pos))?;
        self.inner.write_all(data)?;
        self.inner.seek(SeekFrom::Start(saved))?;
        Ok(true)
    }
}

/// Sink over a forward-only target; counts stay unknown.
pub struct StreamSink<W> {
    inner: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> GsfSink for StreamSink<W> {
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    fn patch_at(&mut self, _pos: u64, _data: &[u8]) -> std::io::Result<bool> {
        Ok(false)
    }
}
