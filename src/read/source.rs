//! Position-tracking buffered input.

use std::io::{self, BufRead, BufReader, Read};

/// Buffered input that knows how many bytes it has handed out.
///
/// Offsets in error messages and the central directory lookup are both
/// relative to the first byte this source read.
pub(crate) struct Source<R> {
    inner: BufReader<R>,
    position: u64,
}

impl<R: Read> Source<R> {
    pub(crate) fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner: BufReader::with_capacity(capacity, inner),
            position: 0,
        }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Reads a 4-byte signature, or `None` at a clean end of input.
    pub(crate) fn read_signature(&mut self) -> io::Result<Option<u32>> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        match filled {
            0 => Ok(None),
            4 => Ok(Some(u32::from_le_bytes(buf))),
            _ => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated record signature",
            )),
        }
    }

    /// Returns true if the buffered input starts with `signature`.
    pub(crate) fn peek_signature(&mut self, signature: u32) -> io::Result<bool> {
        let buf = self.inner.fill_buf()?;
        Ok(buf.len() >= 4 && buf[..4] == signature.to_le_bytes())
    }

    /// Discards exactly `len` bytes.
    pub(crate) fn skip(&mut self, len: u64) -> io::Result<()> {
        let skipped = io::copy(&mut self.by_ref().take(len), &mut io::sink())?;
        if skipped < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected to skip {} bytes, input ended after {}", len, skipped),
            ));
        }
        Ok(())
    }

    pub(crate) fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read> BufRead for Source<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.position += amt as u64;
    }
}
