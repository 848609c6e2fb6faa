//! Async SSB block reader.

use crate::ssb::{tag_str, BlockHeader, BLOCK_HEADER_SIZE, SSB_SIGNATURE};
use bytes::Bytes;
use gsf_core::{Error, Result};
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::debug;

/// Async mirror of the blocking `BlockReader`.
pub struct AsyncBlockReader<R> {
    inner: R,
    pos: u64,
}

impl<R: AsyncRead + AsyncSeek + Unpin> AsyncBlockReader<R> {
    pub async fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position().await?;
        Ok(Self { inner, pos })
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::TruncatedInput
            } else {
                Error::Io(e)
            }
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Reads the 12-byte SSB file header; returns
    /// `(file_type, major, minor)`.
    pub async fn read_file_header(&mut self) -> Result<([u8; 4], u16, u16)> {
        let mut raw = [0u8; 12];
        self.read_exact(&mut raw).await?;
        if raw[0..4] != SSB_SIGNATURE {
            return Err(Error::UnsupportedSignature);
        }
        let file_type: [u8; 4] = raw[4..8].try_into().expect("slice is 4 bytes");
        let major = u16::from_le_bytes(raw[8..10].try_into().expect("slice is 2 bytes"));
        let minor = u16::from_le_bytes(raw[10..12].try_into().expect("slice is 2 bytes"));
        Ok((file_type, major, minor))
    }

    /// Reads the next block header; `Ok(None)` on clean end of stream.
    pub async fn read_block_header(&mut self) -> Result<Option<BlockHeader>> {
        let start = self.pos;
        let mut raw = [0u8; 8];
        let mut filled = 0;
        while filled < raw.len() {
            match self.inner.read(&mut raw[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        self.pos += filled as u64;
        if filled == 0 {
            return Ok(None);
        }
        if filled < raw.len() {
            return Err(Error::TruncatedInput);
        }

        let tag: [u8; 4] = raw[0..4].try_into().expect("slice is 4 bytes");
        let size = u32::from_le_bytes(raw[4..8].try_into().expect("slice is 4 bytes")) as u64;
        if size != 0 && size < BLOCK_HEADER_SIZE {
            return Err(Error::malformed(
                format!("block size {} underflows its own header", size),
                start,
            ));
        }
        debug!(tag = %tag_str(&tag), size, start, "read block header");
        Ok(Some(BlockHeader { tag, size, start }))
    }

    pub async fn read_payload(&mut self, header: &BlockHeader) -> Result<Bytes> {
        let mut buf = vec![0u8; header.payload_len() as usize];
        self.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    pub async fn read_bytes(&mut self, len: u64) -> Result<Bytes> {
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    pub async fn seek_past(&mut self, header: &BlockHeader) -> Result<()> {
        self.seek_to(header.end()).await
    }

    pub async fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.pos {
            self.inner.seek(SeekFrom::Start(offset)).await?;
            self.pos = offset;
        }
        Ok(())
    }

    /// Reads a byte range out of order, restoring the position afterwards.
    pub async fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let saved = self.pos;
        self.seek_to(offset).await?;
        let data = self.read_bytes(len).await;
        self.seek_to(saved).await?;
        data
    }
}
