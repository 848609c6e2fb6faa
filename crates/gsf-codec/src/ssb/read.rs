//! Blocking SSB block reader.
//!
//! Wraps any `Read + Seek` source and tracks the absolute stream position
//! so block bounds and error locations stay exact. Payloads are fetched
//! whole into `Bytes` and decoded by the pure parsers in `wire`.

use super::{tag_str, BLOCK_HEADER_SIZE, GSF_FILE_TYPE, SSB_SIGNATURE};
use bytes::Bytes;
use gsf_core::{Error, Result};
use std::io::{Read, Seek, SeekFrom};
use tracing::debug;

/// A decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub tag: [u8; 4],
    /// Declared size including the 8-byte header. Zero only for the stream
    /// terminator form.
    pub size: u64,
    /// Absolute offset of the block's first byte.
    pub start: u64,
}

impl BlockHeader {
    /// Bytes of payload following the header.
    pub fn payload_len(&self) -> u64 {
        self.size.saturating_sub(BLOCK_HEADER_SIZE)
    }

    /// Absolute offset one past the block's last byte.
    pub fn end(&self) -> u64 {
        self.start + self.size.max(BLOCK_HEADER_SIZE)
    }
}

/// Blocking reader over an SSB stream.
pub struct BlockReader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read + Seek> BlockReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self { inner, pos })
    }

    /// Absolute stream position.
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::TruncatedInput
            } else {
                Error::Io(e)
            }
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Reads the 12-byte SSB file header and returns
    /// `(file_type, major, minor)` after checking the signature.
    pub fn read_file_header(&mut self) -> Result<([u8; 4], u16, u16)> {
        let mut raw = [0u8; 12];
        self.read_exact(&mut raw)?;
        if raw[0..4] != SSB_SIGNATURE {
            return Err(Error::UnsupportedSignature);
        }
        let file_type: [u8; 4] = raw[4..8].try_into().expect("slice is 4 bytes");
        let major = u16::from_le_bytes(raw[8..10].try_into().expect("slice is 2 bytes"));
        let minor = u16::from_le_bytes(raw[10..12].try_into().expect("slice is 2 bytes"));
        Ok((file_type, major, minor))
    }

    /// Reads the next block header.
    ///
    /// Returns `Ok(None)` on a clean end of stream (no bytes where the next
    /// header would start). A stream ending inside the header is
    /// `TruncatedInput`; a size field underflowing the header is
    /// `MalformedBlock`, except the size-zero terminator form, which is
    /// returned as a header with `size == 0` for the caller to recognise.
    pub fn read_block_header(&mut self) -> Result<Option<BlockHeader>> {
        let start = self.pos;
        let mut raw = [0u8; 8];
        let mut filled = 0;
        while filled < raw.len() {
            match self.inner.read(&mut raw[filled..]) {
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

    /// Reads a block's whole payload into memory.
    pub fn read_payload(&mut self, header: &BlockHeader) -> Result<Bytes> {
        let mut buf = vec![0u8; header.payload_len() as usize];
        self.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Reads exactly `len` bytes at the current position.
    pub fn read_bytes(&mut self, len: u64) -> Result<Bytes> {
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }

    /// Seeks past the rest of a block, whatever has been read of it so far.
    pub fn seek_past(&mut self, header: &BlockHeader) -> Result<()> {
        self.seek_to(header.end())
    }

    /// Seeks to an absolute offset.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        if offset != self.pos {
            self.inner.seek(SeekFrom::Start(offset))?;
            self.pos = offset;
        }
        Ok(())
    }

    /// Reads `len` bytes at `offset`, restoring the current position
    /// afterwards. Used to resolve lazy data handles.
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        let saved = self.pos;
        self.seek_to(offset)?;
        let data = self.read_bytes(len);
        self.seek_to(saved)?;
        data
    }
}

/// Checks an SSB file type tag against the grain sequence type.
pub(crate) fn require_gsf_file_type(file_type: [u8; 4]) -> Result<()> {
    if file_type != GSF_FILE_TYPE {
        return Err(Error::WrongFileType {
            found: tag_str(&file_type),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> BlockReader<Cursor<Vec<u8>>> {
        BlockReader::new(Cursor::new(bytes.to_vec())).unwrap()
    }

    // ---------------------------------------------------------------
    // File header
    // ---------------------------------------------------------------

    #[test]
    fn test_file_header_parses() {
        let mut r = reader(b"SSBBgrsg\x08\x00\x00\x00");
        let (file_type, major, minor) = r.read_file_header().unwrap();
        assert_eq!(&file_type, b"grsg");
        assert_eq!(major, 8);
        assert_eq!(minor, 0);
        assert_eq!(r.position(), 12);
    }

    #[test]
    fn test_bad_signature_rejected() {
        let mut r = reader(b"RIFFgrsg\x08\x00\x00\x00");
        assert!(matches!(
            r.read_file_header(),
            Err(Error::UnsupportedSignature)
        ));
    }

    #[test]
    fn test_wrong_file_type_rejected() {
        assert!(matches!(
            require_gsf_file_type(*b"vidx"),
            Err(Error::WrongFileType { .. })
        ));
        assert!(require_gsf_file_type(*b"grsg").is_ok());
    }

    #[test]
    fn test_truncated_file_header() {
        let mut r = reader(b"SSBBgr");
        assert!(matches!(r.read_file_header(), Err(Error::TruncatedInput)));
    }

    // ---------------------------------------------------------------
    // Block headers
    // ---------------------------------------------------------------

    #[test]
    fn test_block_header_roundtrip() {
        let mut bytes = b"head".to_vec();
        bytes.extend_from_slice(&31u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 23]);
        let mut r = reader(&bytes);
        let header = r.read_block_header().unwrap().unwrap();
        assert_eq!(&header.tag, b"head");
        assert_eq!(header.size, 31);
        assert_eq!(header.payload_len(), 23);
        assert_eq!(header.start, 0);
        assert_eq!(header.end(), 31);
    }

    #[test]
    fn test_clean_eof_returns_none() {
        let mut r = reader(b"");
        assert!(r.read_block_header().unwrap().is_none());
    }

    #[test]
    fn test_partial_header_is_truncated_input() {
        let mut r = reader(b"gra");
        assert!(matches!(
            r.read_block_header(),
            Err(Error::TruncatedInput)
        ));
    }

    #[test]
    fn test_size_underflow_is_malformed() {
        let mut bytes = b"grai".to_vec();
        bytes.extend_from_slice(&4u32.to_le_bytes());
        let mut r = reader(&bytes);
        assert!(matches!(
            r.read_block_header(),
            Err(Error::MalformedBlock { .. })
        ));
    }

    #[test]
    fn test_terminator_size_zero_allowed() {
        let mut bytes = b"grai".to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let mut r = reader(&bytes);
        let header = r.read_block_header().unwrap().unwrap();
        assert_eq!(header.size, 0);
        assert_eq!(header.payload_len(), 0);
    }

    // ---------------------------------------------------------------
    // Payloads and seeking
    // ---------------------------------------------------------------

    #[test]
    fn test_seek_past_skips_payload() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"fill");
        bytes.extend_from_slice(&12u32.to_le_bytes());
        bytes.extend_from_slice(&[0xAA; 4]);
        bytes.extend_from_slice(b"grai");
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let mut r = reader(&bytes);
        let fill = r.read_block_header().unwrap().unwrap();
        assert_eq!(&fill.tag, b"fill");
        r.seek_past(&fill).unwrap();
        let next = r.read_block_header().unwrap().unwrap();
        assert_eq!(&next.tag, b"grai");
        assert_eq!(next.start, 12);
    }

    #[test]
    fn test_truncated_payload_read() {
        let mut bytes = b"grdt".to_vec();
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 10]);
        let mut r = reader(&bytes);
        let header = r.read_block_header().unwrap().unwrap();
        assert!(matches!(
            r.read_payload(&header),
            Err(Error::TruncatedInput)
        ));
    }

    #[test]
    fn test_read_at_restores_position() {
        let mut bytes = b"abcdefgh".to_vec();
        bytes.extend_from_slice(b"ijklmnop");
        let mut r = reader(&bytes);
        let _ = r.read_bytes(4).unwrap();
        let data = r.read_at(8, 4).unwrap();
        assert_eq!(data.as_ref(), b"ijkl");
        assert_eq!(r.position(), 4);
    }
}
