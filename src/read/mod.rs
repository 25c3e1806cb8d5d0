//! Sequential zip reading.
//!
//! [`ZipReader`] walks local entries front to back, the way a pipe or socket
//! delivers them. Each call to [`ZipReader::next_entry`] yields the metadata
//! of the next entry; its decoded bytes are then read through the reader's
//! own [`Read`] implementation until exhausted or until the next
//! `next_entry` call, which drains whatever was left unread.
//!
//! Every decoded entry is checked against its recorded CRC-32 and size once
//! its last byte has been read. Any I/O failure or integrity problem latches
//! the reader into a failed state: the container is no longer trustworthy
//! and every later call fails.
//!
//! # Example
//!
//! ```rust
//! use std::io::Read;
//! use rezip::{ZipEntry, ZipReader, ZipWriter};
//!
//! # fn main() -> rezip::Result<()> {
//! let mut writer = ZipWriter::new(Vec::new());
//! writer.start_entry(&ZipEntry::new("hello.txt"))?;
//! std::io::Write::write_all(&mut writer, b"hello")?;
//! let bytes = writer.finish()?;
//!
//! let mut reader = ZipReader::new(&bytes[..]);
//! while let Some(entry) = reader.next_entry()? {
//!     let mut content = String::new();
//!     reader.read_to_string(&mut content)?;
//!     println!("{}: {}", entry.name, content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod index;
mod source;

pub use index::{CentralIndex, IndexRecord};

use std::fmt;
use std::io::{self, BufRead, Read, Seek};

use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, warn};

use crate::checksum::Crc32;
use crate::entry::{CompressionMethod, ZipEntry};
use crate::format::header::{
    CentralDirectoryHeader, DataDescriptor, EndOfCentralDirectory, LocalFileHeader,
};
use crate::format::{
    CENTRAL_DIRECTORY_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
    LOCAL_FILE_HEADER_SIGNATURE, ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE, flags, is_zip_magic,
};
use crate::{Error, Result};
use source::Source;

/// Default capacity of the input buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

enum EntryData {
    Stored { remaining: u64 },
    Deflated,
    /// Undecodable bytes passed through as stored in the container.
    Raw { remaining: u64 },
}

struct OpenEntry {
    name: String,
    data: EntryData,
    descriptor: bool,
    expected_crc: Option<u32>,
    expected_size: Option<u64>,
    expected_compressed: Option<u64>,
    crc: Crc32,
    produced: u64,
    consumed: u64,
    done: bool,
}

/// Streaming reader over the entries of a zip container.
pub struct ZipReader<R> {
    source: Source<R>,
    inflater: Decompress,
    current: Option<OpenEntry>,
    index: Option<CentralIndex>,
    comment: Option<String>,
    entries_read: usize,
    finished: bool,
    failed: bool,
}

impl<R> fmt::Debug for ZipReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipReader")
            .field("entries_read", &self.entries_read)
            .field("indexed", &self.index.is_some())
            .field("finished", &self.finished)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<R: Read> ZipReader<R> {
    /// Creates a purely sequential reader.
    pub fn new(inner: R) -> Self {
        Self::with_buffer_capacity(inner, DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates a sequential reader with a specific input buffer capacity.
    pub fn with_buffer_capacity(inner: R, capacity: usize) -> Self {
        Self {
            source: Source::new(inner, capacity.max(64)),
            inflater: Decompress::new(false),
            current: None,
            index: None,
            comment: None,
            entries_read: 0,
            finished: false,
            failed: false,
        }
    }

    /// Advances to the next entry.
    ///
    /// Unread bytes of the previous entry are drained (and verified) first.
    /// Returns `Ok(None)` once the central directory or the end of input is
    /// reached.
    ///
    /// # Errors
    ///
    /// Any error latches the reader into the failed state, see
    /// [`is_failed`](Self::is_failed).
    pub fn next_entry(&mut self) -> Result<Option<ZipEntry>> {
        if self.failed {
            return Err(Error::Poisoned { stream: "reader" });
        }
        if self.finished {
            return Ok(None);
        }
        let result = self.advance();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Returns the archive comment, `None` when absent or empty.
    ///
    /// Indexed readers know it from the start. Sequential readers learn it
    /// from the end of central directory record, so it is only available
    /// after [`next_entry`](Self::next_entry) has returned `None`.
    pub fn archive_comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Returns true once the underlying stream failed or the container was
    /// found corrupt.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Number of entries returned so far.
    pub fn entries_read(&self) -> usize {
        self.entries_read
    }

    /// Bytes consumed from the underlying stream.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Returns the central directory index, if one was read.
    pub fn index(&self) -> Option<&CentralIndex> {
        self.index.as_ref()
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn advance(&mut self) -> Result<Option<ZipEntry>> {
        self.drain()?;

        if let Some(index) = &self.index {
            let position = self.source.position();
            match index.next_offset(position) {
                None => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(next) if next > position => {
                    let gap = next - position;
                    if position == 0 && next == index.prefix() {
                        debug!("skipping {} prefix bytes", gap);
                    } else {
                        warn!(
                            "skipping {} bytes at {:#x} not referenced by the central directory",
                            gap, position
                        );
                    }
                    self.source.skip(gap)?;
                }
                Some(_) => {}
            }
        }

        let offset = self.source.position();
        let Some(signature) = self.source.read_signature()? else {
            self.finished = true;
            return Ok(None);
        };
        match signature {
            LOCAL_FILE_HEADER_SIGNATURE => {}
            CENTRAL_DIRECTORY_SIGNATURE | END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
                self.read_trailer(signature)?;
                self.finished = true;
                return Ok(None);
            }
            ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
                return Err(Error::UnsupportedFeature { feature: "zip64" });
            }
            other if offset == 0 && !is_zip_magic(&other.to_le_bytes()) => {
                return Err(Error::InvalidFormat("input is not a zip container".into()));
            }
            other => {
                return Err(Error::CorruptHeader {
                    offset,
                    reason: format!("unexpected record signature {:#010x}", other),
                });
            }
        }

        let header = LocalFileHeader::read_body(&mut self.source)?;
        if header.has_zip64_sizes() {
            return Err(Error::UnsupportedFeature {
                feature: "zip64 entry sizes",
            });
        }
        let name = decode_name(header.name);
        let descriptor = header.flags & flags::DATA_DESCRIPTOR != 0;

        let deferred = descriptor
            && header.crc32 == 0
            && header.compressed_size == 0
            && header.uncompressed_size == 0;
        let (mut size, mut compressed_size, mut crc32) = if deferred {
            (None, None, None)
        } else {
            (
                Some(header.uncompressed_size as u64),
                Some(header.compressed_size as u64),
                Some(header.crc32),
            )
        };

        let mut entry = ZipEntry::new(name);
        entry.method = CompressionMethod::from_id(header.method);
        entry.extra = header.extra;
        entry.modified = header.modified;
        entry.flags = header.flags;

        if let Some(record) = self.index.as_ref().and_then(|index| index.get(offset)) {
            if deferred {
                size = Some(record.size);
                compressed_size = Some(record.compressed_size);
                crc32 = Some(record.crc32);
            }
            entry.comment = record.comment.clone();
            entry.version_made_by = record.version_made_by;
            entry.external_attributes = record.external_attributes;
        }

        let data = if !entry.can_decode() {
            let Some(len) = compressed_size else {
                return Err(Error::UnsupportedFeature {
                    feature: "undecodable entry with unknown compressed size",
                });
            };
            if entry.is_encrypted() {
                warn!("entry '{}' is encrypted, passing it through raw", entry.name);
            } else {
                warn!(
                    "entry '{}' uses compression method {}, passing it through raw",
                    entry.name,
                    entry.method.id()
                );
            }
            EntryData::Raw { remaining: len }
        } else if entry.method == CompressionMethod::Stored {
            let len = match compressed_size {
                Some(len) => len,
                // An empty stored entry is directly followed by its descriptor.
                None if self.source.peek_signature(DATA_DESCRIPTOR_SIGNATURE)? => {
                    size = Some(0);
                    compressed_size = Some(0);
                    crc32 = Some(0);
                    0
                }
                None => {
                    return Err(Error::UnsupportedFeature {
                        feature: "stored entry with data descriptor and unknown size",
                    });
                }
            };
            EntryData::Stored { remaining: len }
        } else {
            self.inflater.reset(false);
            EntryData::Deflated
        };

        entry.size = size;
        entry.compressed_size = compressed_size;
        entry.crc32 = crc32;

        debug!(
            "entry '{}' at {:#x}: method {}, size {:?}",
            entry.name,
            offset,
            entry.method.id(),
            entry.size
        );

        self.current = Some(OpenEntry {
            name: entry.name.clone(),
            data,
            descriptor,
            expected_crc: crc32,
            expected_size: size,
            expected_compressed: compressed_size,
            crc: Crc32::new(),
            produced: 0,
            consumed: 0,
            done: false,
        });
        self.entries_read += 1;
        Ok(Some(entry))
    }

    /// Reads (and verifies) whatever is left of the current entry.
    fn drain(&mut self) -> Result<()> {
        if self.current.as_ref().is_some_and(|entry| !entry.done) {
            let mut scratch = [0u8; 8 * 1024];
            while self.read_entry_data(&mut scratch)? > 0 {}
        }
        self.current = None;
        Ok(())
    }

    /// Parses the central directory up to the end record for its comment.
    fn read_trailer(&mut self, mut signature: u32) -> Result<()> {
        let mut listed = 0usize;
        loop {
            match signature {
                CENTRAL_DIRECTORY_SIGNATURE => {
                    CentralDirectoryHeader::read_body(&mut self.source)?;
                    listed += 1;
                }
                END_OF_CENTRAL_DIRECTORY_SIGNATURE => {
                    let eocd = EndOfCentralDirectory::read_body(&mut self.source)?;
                    if usize::from(eocd.total_entries) != listed {
                        debug!(
                            "end record counts {} entries, central directory lists {}",
                            eocd.total_entries, listed
                        );
                    }
                    let comment = String::from_utf8_lossy(&eocd.comment).into_owned();
                    self.comment = non_empty(comment);
                    return Ok(());
                }
                other => {
                    debug!("stopping at trailer record {:#010x}", other);
                    return Ok(());
                }
            }
            match self.source.read_signature()? {
                Some(next) => signature = next,
                None => {
                    warn!("input ends inside the central directory");
                    return Ok(());
                }
            }
        }
    }

    fn read_entry_data(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Self {
            source,
            inflater,
            current,
            ..
        } = self;
        let Some(entry) = current.as_mut() else {
            return Ok(0);
        };
        if entry.done || buf.is_empty() {
            return Ok(0);
        }

        let (n, exhausted) = match entry.data {
            EntryData::Stored { ref mut remaining } | EntryData::Raw { ref mut remaining } => {
                if *remaining == 0 {
                    (0, true)
                } else {
                    let max = (*remaining).min(buf.len() as u64) as usize;
                    let n = source.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(truncated(&entry.name, source.position()));
                    }
                    *remaining -= n as u64;
                    entry.consumed += n as u64;
                    (n, *remaining == 0)
                }
            }
            EntryData::Deflated => inflate(source, inflater, buf, entry)?,
        };

        if !matches!(entry.data, EntryData::Raw { .. }) {
            entry.crc.update(&buf[..n]);
        }
        entry.produced += n as u64;
        if exhausted {
            entry.done = true;
            complete(source, entry)?;
        }
        Ok(n)
    }
}

impl<R: Read + Seek> ZipReader<R> {
    /// Creates a reader that pre-scans the central directory.
    ///
    /// The index supplies entry comments, attributes and the sizes of
    /// entries written with data descriptors. Bytes preceding the archive
    /// and local entries missing from the central directory are skipped.
    ///
    /// # Errors
    ///
    /// Fails if the central directory cannot be located or parsed.
    pub fn with_index(mut inner: R) -> Result<Self> {
        let index = CentralIndex::read(&mut inner)?;
        debug!(
            "central directory at {:#x} lists {} entries",
            index.central_directory_start(),
            index.len()
        );
        let mut reader = Self::new(inner);
        reader.comment = non_empty(index.comment().to_owned());
        reader.index = Some(index);
        Ok(reader)
    }
}

impl<R: Read> Read for ZipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.failed {
            return Err(Error::Poisoned { stream: "reader" }.into_io());
        }
        let result = self.read_entry_data(buf);
        if result.is_err() {
            self.failed = true;
        }
        result.map_err(Error::into_io)
    }
}

fn non_empty(comment: String) -> Option<String> {
    (!comment.is_empty()).then_some(comment)
}

fn decode_name(raw: Vec<u8>) -> String {
    match String::from_utf8(raw) {
        Ok(name) => name,
        Err(e) => {
            let name = String::from_utf8_lossy(e.as_bytes()).into_owned();
            warn!("entry name {:?} is not valid UTF-8", name);
            name
        }
    }
}

fn truncated(name: &str, offset: u64) -> Error {
    Error::CorruptHeader {
        offset,
        reason: format!("data of entry '{}' is truncated", name),
    }
}

/// Inflates into `buf` until output is produced or the stream ends.
fn inflate<R: Read>(
    source: &mut Source<R>,
    inflater: &mut Decompress,
    buf: &mut [u8],
    entry: &mut OpenEntry,
) -> Result<(usize, bool)> {
    loop {
        let position = source.position();
        let input = source.fill_buf()?;
        let eof = input.is_empty();
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let flush = if eof {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let status = inflater
            .decompress(input, buf, flush)
            .map_err(|e| Error::CorruptHeader {
                offset: position,
                reason: format!("invalid deflate data in '{}': {}", entry.name, e),
            })?;
        let read = (inflater.total_in() - in_before) as usize;
        let written = (inflater.total_out() - out_before) as usize;
        source.consume(read);
        entry.consumed += read as u64;

        match status {
            Status::StreamEnd => return Ok((written, true)),
            Status::Ok | Status::BufError => {
                if written > 0 {
                    return Ok((written, false));
                }
                if eof {
                    return Err(truncated(&entry.name, source.position()));
                }
                if read == 0 {
                    return Err(Error::CorruptHeader {
                        offset: position,
                        reason: format!("deflate data of '{}' makes no progress", entry.name),
                    });
                }
            }
        }
    }
}

/// Verifies an entry whose last byte has been read.
fn complete<R: Read>(source: &mut Source<R>, entry: &OpenEntry) -> Result<()> {
    let (crc, size, compressed) = if entry.descriptor {
        let offset = source.position();
        let descriptor = DataDescriptor::read(source).map_err(|e| Error::CorruptHeader {
            offset,
            reason: format!("unreadable data descriptor of '{}': {}", entry.name, e),
        })?;
        (
            Some(descriptor.crc32),
            Some(descriptor.uncompressed_size as u64),
            Some(descriptor.compressed_size as u64),
        )
    } else {
        (
            entry.expected_crc,
            entry.expected_size,
            entry.expected_compressed,
        )
    };

    if let Some(expected) = compressed {
        if expected != entry.consumed {
            return Err(Error::CorruptHeader {
                offset: source.position(),
                reason: format!(
                    "entry '{}' occupies {} bytes, header declares {}",
                    entry.name, entry.consumed, expected
                ),
            });
        }
    }
    if matches!(entry.data, EntryData::Raw { .. }) {
        return Ok(());
    }
    if let Some(expected) = size {
        if expected != entry.produced {
            return Err(Error::SizeMismatch {
                entry_name: entry.name.clone(),
                expected,
                actual: entry.produced,
            });
        }
    }
    if let Some(expected) = crc {
        let actual = entry.crc.finalize();
        if expected != actual {
            return Err(Error::CrcMismatch {
                entry_name: entry.name.clone(),
                expected,
                actual,
            });
        }
    }
    Ok(())
}
