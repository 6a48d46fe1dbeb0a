//! Slow-start buffer record format and incremental reader.
//!
//! Record format:
//! - len: u32 (big-endian), payload length, never zero
//! - checksum: u64 (big-endian), XXH64 of the payload
//! - payload: bytes[len]
//!
//! Records are written back-to-back with no index; the only access pattern is a
//! sequential scan from offset 0 that may run concurrently with appends.

use crate::checksum;
use crate::error::RecordError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::{ErrorKind, Read};

/// Size of the fixed record header.
pub const HEADER_LEN: usize = 12;

/// Encodes `payload` as a single header + payload record.
///
/// The record is returned as one contiguous buffer so the caller can append it
/// with a single write.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_u64(checksum::checksum(payload));
    buf.put_slice(payload);
    buf.freeze()
}

/// A record read back from the buffer. The checksum has not been verified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub checksum: u64,
    pub payload: Bytes,
}

impl Frame {
    /// Returns true if the payload still matches its stored checksum.
    pub fn is_intact(&self) -> bool {
        checksum::verify(&self.payload, self.checksum)
    }

    pub fn len(&self) -> u32 {
        self.payload.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Decodes one record from the front of `buf`.
///
/// Returns `Ok(None)` and leaves `buf` untouched when the record is not yet
/// complete. Header fields are validated as soon as the header is available.
pub fn decode(buf: &mut BytesMut, max_len: u32) -> Result<Option<Frame>, RecordError> {
    if buf.len() < HEADER_LEN {
        return Ok(None);
    }

    let mut header = &buf[..HEADER_LEN];
    let len = header.get_u32();
    let checksum = header.get_u64();

    if len == 0 {
        return Err(RecordError::ZeroLength);
    }
    if len > max_len {
        return Err(RecordError::LengthOutOfRange { len, max: max_len });
    }

    let total = HEADER_LEN + len as usize;
    if buf.len() < total {
        return Ok(None);
    }

    buf.advance(HEADER_LEN);
    let payload = buf.split_to(len as usize).freeze();
    Ok(Some(Frame { checksum, payload }))
}

/// Sequential reader over a buffer file that may still be growing.
///
/// Bytes of a record that is only partially visible are kept between calls, so
/// a later call resumes exactly where the previous one stopped.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    chunk: Box<[u8]>,
    max_len: u32,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, chunk_size: usize, max_len: u32) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(chunk_size),
            chunk: vec![0u8; chunk_size.max(HEADER_LEN)].into_boxed_slice(),
            max_len,
        }
    }

    /// Reads the next complete record.
    ///
    /// `Ok(None)` means the reader has consumed everything currently in the
    /// file. Check [`pending`](Self::pending) to tell a clean record boundary
    /// from a partially written record.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, RecordError> {
        loop {
            if let Some(frame) = decode(&mut self.buf, self.max_len)? {
                return Ok(Some(frame));
            }

            let n = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Ok(None);
            }
            self.buf.extend_from_slice(&self.chunk[..n]);
        }
    }

    /// Number of bytes read past the last complete record.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
