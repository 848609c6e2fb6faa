//! Async encoder sinks.

use async_trait::async_trait;
use std::io::SeekFrom;
use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Async mirror of the blocking `GsfSink`: an output that may support
/// patching already-written bytes.
#[async_trait]
pub trait AsyncGsfSink: Send {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;

    async fn flush(&mut self) -> std::io::Result<()>;

    /// Overwrites bytes at `pos`, leaving the append position unchanged.
    /// Returns `false` when the target cannot seek.
    async fn patch_at(&mut self, pos: u64, data: &[u8]) -> std::io::Result<bool>;
}

/// Async sink over a seekable target.
pub struct AsyncSeekableSink<W> {
    inner: W,
}

impl<W> AsyncSeekableSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + AsyncSeek + Unpin + Send> AsyncGsfSink for AsyncSeekableSink<W> {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    async fn patch_at(&mut self, pos: u64, data: &[u8]) -> std::io::Result<bool> {
        let saved = self.inner.stream_position().await?;
        self.inner.seek(SeekFrom::Start(pos)).await?;
        self.inner.write_all(data).await?;
        self.inner.seek(SeekFrom::Start(saved)).await?;
        Ok(true)
    }
}

/// Async sink over a forward-only target.
pub struct AsyncStreamSink<W> {
    inner: W,
}

impl<W> AsyncStreamSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> AsyncGsfSink for AsyncStreamSink<W> {
    async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data).await
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush().await
    }

    async fn patch_at(&mut self, _pos: u64, _data: &[u8]) -> std::io::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_seekable_sink_patches() {
        let mut sink = AsyncSeekableSink::new(Cursor::new(Vec::new()));
        sink.write_all(b"00000000").await.unwrap();
        assert!(sink.patch_at(4, b"ab").await.unwrap());
        sink.write_all(b"!").await.unwrap();
        assert_eq!(sink.into_inner().into_inner(), b"0000ab00!");
    }

    #[tokio::test]
    async fn test_stream_sink_declines_patch() {
        let mut sink = AsyncStreamSink::new(Vec::new());
        sink.write_all(b"abc").await.unwrap();
        assert!(!sink.patch_at(0, b"z").await.unwrap());
    }
}
