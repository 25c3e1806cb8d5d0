//! Sequential zip writing.
//!
//! [`ZipWriter`] emits one entry at a time: [`start_entry`] writes the local
//! header, entry bytes go through the writer's [`Write`] implementation,
//! and [`close_entry`] completes the entry. [`finish`] writes the central
//! directory and the end record and hands back the underlying stream.
//!
//! Deflated entries are always framed with a data descriptor, so their CRC
//! and sizes are computed from what was actually written. Stored entries
//! must declare size and CRC up front; the writer verifies both on close.
//!
//! [`start_entry`]: ZipWriter::start_entry
//! [`close_entry`]: ZipWriter::close_entry
//! [`finish`]: ZipWriter::finish

use std::collections::HashSet;
use std::fmt;
use std::io::{self, Write};
use std::mem;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use log::debug;

use crate::checksum::Crc32;
use crate::entry::{CompressionMethod, ZipEntry};
use crate::format::header::{
    CentralDirectoryHeader, DataDescriptor, EndOfCentralDirectory, LocalFileHeader,
};
use crate::format::{
    VERSION_DEFLATE, VERSION_MADE_BY_DEFAULT, VERSION_STORED, ZIP64_SENTINEL_U16,
    ZIP64_SENTINEL_U32, flags,
};
use crate::{Error, Result};

/// Default deflate level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Writer wrapper that counts bytes written.
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

enum EntryMode {
    Stored { size: u64, crc32: u32 },
    Deflated(DeflateEncoder<Vec<u8>>),
    Raw { compressed_size: u64, descriptor: bool },
}

impl EntryMode {
    /// Left behind when the mode of a closing entry is taken.
    const EMPTY: EntryMode = EntryMode::Raw {
        compressed_size: 0,
        descriptor: false,
    };
}

struct PendingEntry {
    name: String,
    central: CentralDirectoryHeader,
    mode: EntryMode,
    crc: Crc32,
    /// Bytes handed to the entry.
    written: u64,
    /// Bytes emitted for the entry after the local header.
    emitted: u64,
}

/// Streaming writer for zip containers.
pub struct ZipWriter<W: Write> {
    inner: CountingWriter<W>,
    central: Vec<CentralDirectoryHeader>,
    names: HashSet<String>,
    current: Option<PendingEntry>,
    level: Compression,
    comment: String,
    failed: bool,
}

impl<W: Write> fmt::Debug for ZipWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipWriter")
            .field("entries", &self.central.len())
            .field("offset", &self.inner.count)
            .field("open_entry", &self.current.as_ref().map(|e| e.name.as_str()))
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<W: Write> ZipWriter<W> {
    /// Creates a writer using the default compression level.
    pub fn new(inner: W) -> Self {
        Self::with_level(inner, DEFAULT_COMPRESSION_LEVEL)
    }

    /// Creates a writer using deflate `level` (clamped to 0-9).
    pub fn with_level(inner: W, level: u32) -> Self {
        Self {
            inner: CountingWriter { inner, count: 0 },
            central: Vec::new(),
            names: HashSet::new(),
            current: None,
            level: Compression::new(level.min(9)),
            comment: String::new(),
            failed: false,
        }
    }

    /// Sets the archive comment written by [`finish`](Self::finish).
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Returns true once the underlying stream failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Returns true while an entry is open.
    pub fn has_open_entry(&self) -> bool {
        self.current.is_some()
    }

    /// Number of entries completed so far.
    pub fn entries_written(&self) -> usize {
        self.central.len()
    }

    /// Bytes written to the underlying stream so far.
    pub fn bytes_written(&self) -> u64 {
        self.inner.count
    }

    /// Opens a new entry, closing any open one first.
    ///
    /// Only stored and deflated entries can be started this way. Stored
    /// entries must declare their size and CRC-32. Everything else about
    /// the entry (timestamp, extra field, comment, attributes) is copied.
    ///
    /// # Errors
    ///
    /// Rejects duplicate names, unsupported methods and incomplete stored
    /// metadata before anything is written.
    pub fn start_entry(&mut self, entry: &ZipEntry) -> Result<()> {
        self.ensure_usable()?;
        if self.current.is_some() {
            self.close_entry()?;
        }
        self.check_name(&entry.name)?;

        let (mode, version_needed, entry_flags, crc32, size) = match entry.method {
            CompressionMethod::Stored => {
                let size = require(entry.size, &entry.name, "size")?;
                let crc32 = require(entry.crc32, &entry.name, "crc32")?;
                check_zip32(size)?;
                (
                    EntryMode::Stored { size, crc32 },
                    VERSION_STORED,
                    0,
                    crc32,
                    size as u32,
                )
            }
            CompressionMethod::Deflated => (
                EntryMode::Deflated(DeflateEncoder::new(Vec::new(), self.level)),
                VERSION_DEFLATE,
                flags::DATA_DESCRIPTOR,
                0,
                0,
            ),
            CompressionMethod::Other(method) => {
                return Err(Error::UnsupportedMethod {
                    entry_name: entry.name.clone(),
                    method,
                });
            }
        };

        let header = LocalFileHeader {
            version_needed,
            flags: entry_flags | utf8_flag(entry),
            method: entry.method.id(),
            modified: entry.modified,
            crc32,
            compressed_size: size,
            uncompressed_size: size,
            name: entry.name.as_bytes().to_vec(),
            extra: entry.extra.clone(),
        };
        self.open(entry, header, mode)
    }

    /// Opens an entry whose bytes are written exactly as they will be stored.
    ///
    /// Used to copy entries that cannot be decoded (unknown methods,
    /// encryption). Method, flags, CRC and both sizes are taken from `entry`
    /// and must all be known.
    ///
    /// Encrypted entries keep a data descriptor flag: traditional PKWARE
    /// encryption checks its password byte against the DOS time instead of
    /// the CRC when the bit is set. The descriptor is written after the data.
    pub fn start_raw_entry(&mut self, entry: &ZipEntry) -> Result<()> {
        self.ensure_usable()?;
        if self.current.is_some() {
            self.close_entry()?;
        }
        self.check_name(&entry.name)?;

        let size = require(entry.size, &entry.name, "size")?;
        let compressed_size = require(entry.compressed_size, &entry.name, "compressed size")?;
        let crc32 = require(entry.crc32, &entry.name, "crc32")?;
        check_zip32(size)?;
        check_zip32(compressed_size)?;

        let descriptor = entry.is_encrypted() && entry.has_data_descriptor();
        let mut entry_flags = entry.flags & !flags::DATA_DESCRIPTOR;
        if descriptor {
            entry_flags |= flags::DATA_DESCRIPTOR;
        }
        let header = LocalFileHeader {
            version_needed: version_needed(entry.method),
            flags: entry_flags | utf8_flag(entry),
            method: entry.method.id(),
            modified: entry.modified,
            crc32,
            compressed_size: compressed_size as u32,
            uncompressed_size: size as u32,
            name: entry.name.as_bytes().to_vec(),
            extra: entry.extra.clone(),
        };
        let mode = EntryMode::Raw {
            compressed_size,
            descriptor,
        };
        self.open(entry, header, mode)
    }

    fn open(&mut self, entry: &ZipEntry, header: LocalFileHeader, mode: EntryMode) -> Result<()> {
        let offset = self.inner.count;
        if offset >= ZIP64_SENTINEL_U32 as u64 {
            return Err(Error::UnsupportedFeature {
                feature: "zip64 offsets",
            });
        }
        let result = header.write(&mut self.inner);
        self.latch(result)?;

        let version_made_by = if entry.version_made_by == 0 {
            VERSION_MADE_BY_DEFAULT
        } else {
            entry.version_made_by
        };
        let central = CentralDirectoryHeader {
            version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            method: header.method,
            modified: header.modified,
            crc32: header.crc32,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            name: header.name,
            extra: header.extra,
            comment: entry
                .comment
                .as_deref()
                .map(|c| c.as_bytes().to_vec())
                .unwrap_or_default(),
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: entry.external_attributes,
            local_header_offset: offset as u32,
        };
        self.names.insert(entry.name.clone());
        self.current = Some(PendingEntry {
            name: entry.name.clone(),
            central,
            mode,
            crc: Crc32::new(),
            written: 0,
            emitted: 0,
        });
        Ok(())
    }

    /// Completes the open entry and adds it to the central directory.
    ///
    /// # Errors
    ///
    /// Stored and raw entries that received a different number of bytes
    /// than declared, or stored entries whose CRC differs from the declared
    /// one, fail with [`Error::SizeMismatch`] or [`Error::CrcMismatch`].
    /// Their framing is still completed so the writer stays usable, but the
    /// entry is left out of the central directory.
    pub fn close_entry(&mut self) -> Result<()> {
        self.ensure_usable()?;
        let Some(mut entry) = self.current.take() else {
            return Err(Error::NoOpenEntry);
        };

        let mismatch = match mem::replace(&mut entry.mode, EntryMode::EMPTY) {
            EntryMode::Deflated(encoder) => {
                self.finish_deflate(&mut entry, encoder)?;
                None
            }
            EntryMode::Stored { size, crc32 } => {
                if entry.written != size {
                    self.pad(&mut entry, size)?;
                    Some(Error::SizeMismatch {
                        entry_name: entry.name.clone(),
                        expected: size,
                        actual: entry.written,
                    })
                } else if entry.crc.finalize() != crc32 {
                    Some(Error::CrcMismatch {
                        entry_name: entry.name.clone(),
                        expected: crc32,
                        actual: entry.crc.finalize(),
                    })
                } else {
                    None
                }
            }
            EntryMode::Raw {
                compressed_size,
                descriptor,
            } => {
                let mismatch = if entry.written != compressed_size {
                    self.pad(&mut entry, compressed_size)?;
                    Some(Error::SizeMismatch {
                        entry_name: entry.name.clone(),
                        expected: compressed_size,
                        actual: entry.written,
                    })
                } else {
                    None
                };
                if descriptor {
                    self.write_raw_descriptor(&entry)?;
                }
                mismatch
            }
        };

        if let Some(error) = mismatch {
            self.names.remove(&entry.name);
            return Err(error);
        }
        self.central.push(entry.central);
        Ok(())
    }

    /// Terminates the open entry without adding it to the central directory.
    ///
    /// The local framing is completed so the stream stays well formed. Does
    /// nothing if no entry is open.
    pub fn abort_entry(&mut self) -> Result<()> {
        let Some(mut entry) = self.current.take() else {
            return Ok(());
        };
        self.names.remove(&entry.name);
        self.ensure_usable()?;
        match mem::replace(&mut entry.mode, EntryMode::EMPTY) {
            EntryMode::Deflated(encoder) => self.finish_deflate(&mut entry, encoder)?,
            EntryMode::Stored { size, .. } => self.pad(&mut entry, size)?,
            EntryMode::Raw {
                compressed_size,
                descriptor,
            } => {
                self.pad(&mut entry, compressed_size)?;
                if descriptor {
                    self.write_raw_descriptor(&entry)?;
                }
            }
        }
        debug!("dropped entry '{}' from the central directory", entry.name);
        Ok(())
    }

    /// Writes the central directory and the end record.
    ///
    /// An entry still open is closed first.
    ///
    /// # Errors
    ///
    /// Fails if the writer already failed, if closing the open entry fails,
    /// or if the archive needs zip64 records.
    pub fn finish(mut self) -> Result<W> {
        self.ensure_usable()?;
        if self.current.is_some() {
            self.close_entry()?;
        }
        if self.central.len() >= ZIP64_SENTINEL_U16 as usize {
            return Err(Error::UnsupportedFeature {
                feature: "zip64 entry count",
            });
        }

        let start = self.inner.count;
        for header in &self.central {
            let result = header.write(&mut self.inner);
            if let Err(e) = result {
                self.failed = true;
                return Err(e.into());
            }
        }
        let size = self.inner.count - start;
        if start >= ZIP64_SENTINEL_U32 as u64 || size >= ZIP64_SENTINEL_U32 as u64 {
            return Err(Error::UnsupportedFeature {
                feature: "zip64 central directory",
            });
        }

        let count = self.central.len() as u16;
        let end = EndOfCentralDirectory {
            disk_number: 0,
            central_directory_disk: 0,
            disk_entries: count,
            total_entries: count,
            central_directory_size: size as u32,
            central_directory_offset: start as u32,
            comment: self.comment.as_bytes().to_vec(),
        };
        let result = end.write(&mut self.inner).and_then(|()| self.inner.flush());
        self.latch(result)?;
        debug!(
            "wrote {} entries, {} bytes",
            self.central.len(),
            self.inner.count
        );
        Ok(self.inner.inner)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(Error::Poisoned { stream: "writer" });
        }
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(Error::DuplicateEntry {
                name: name.to_string(),
            });
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::invalid_name(name, "too long for a zip header"));
        }
        Ok(())
    }

    fn latch<T>(&mut self, result: io::Result<T>) -> Result<T> {
        result.map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }

    fn emit(&mut self, entry: &mut PendingEntry, bytes: &[u8]) -> Result<()> {
        let result = self.inner.write_all(bytes);
        self.latch(result)?;
        entry.emitted += bytes.len() as u64;
        Ok(())
    }

    /// Zero-fills a stored or raw entry up to its declared length.
    fn pad(&mut self, entry: &mut PendingEntry, declared: u64) -> Result<()> {
        let zeros = [0u8; 4096];
        while entry.emitted < declared {
            let n = (declared - entry.emitted).min(zeros.len() as u64) as usize;
            self.emit(entry, &zeros[..n])?;
        }
        Ok(())
    }

    fn finish_deflate(
        &mut self,
        entry: &mut PendingEntry,
        encoder: DeflateEncoder<Vec<u8>>,
    ) -> Result<()> {
        let tail = encoder.finish()?;
        self.emit(entry, &tail)?;
        if entry.written >= ZIP64_SENTINEL_U32 as u64 || entry.emitted >= ZIP64_SENTINEL_U32 as u64
        {
            self.failed = true;
            return Err(Error::UnsupportedFeature {
                feature: "zip64 entry sizes",
            });
        }
        let descriptor = DataDescriptor {
            crc32: entry.crc.finalize(),
            compressed_size: entry.emitted as u32,
            uncompressed_size: entry.written as u32,
        };
        let result = descriptor.write(&mut self.inner);
        self.latch(result)?;
        entry.central.crc32 = descriptor.crc32;
        entry.central.compressed_size = descriptor.compressed_size;
        entry.central.uncompressed_size = descriptor.uncompressed_size;
        Ok(())
    }

    /// Repeats the copied CRC and sizes in a descriptor after raw data.
    fn write_raw_descriptor(&mut self, entry: &PendingEntry) -> Result<()> {
        let descriptor = DataDescriptor {
            crc32: entry.central.crc32,
            compressed_size: entry.central.compressed_size,
            uncompressed_size: entry.central.uncompressed_size,
        };
        let result = descriptor.write(&mut self.inner);
        self.latch(result)
    }

    fn write_entry_data(&mut self, buf: &[u8]) -> Result<()> {
        self.ensure_usable()?;
        let Some(mut entry) = self.current.take() else {
            return Err(Error::NoOpenEntry);
        };
        let result = self.write_to(&mut entry, buf);
        self.current = Some(entry);
        result
    }

    fn write_to(&mut self, entry: &mut PendingEntry, buf: &[u8]) -> Result<()> {
        match &mut entry.mode {
            EntryMode::Stored { size, .. } => {
                let size = *size;
                if entry.written + buf.len() as u64 > size {
                    return Err(Error::SizeMismatch {
                        entry_name: entry.name.clone(),
                        expected: size,
                        actual: entry.written + buf.len() as u64,
                    });
                }
                self.emit(entry, buf)?;
                entry.crc.update(buf);
            }
            EntryMode::Raw { compressed_size, .. } => {
                let declared = *compressed_size;
                if entry.written + buf.len() as u64 > declared {
                    return Err(Error::SizeMismatch {
                        entry_name: entry.name.clone(),
                        expected: declared,
                        actual: entry.written + buf.len() as u64,
                    });
                }
                self.emit(entry, buf)?;
            }
            EntryMode::Deflated(encoder) => {
                encoder.write_all(buf)?;
                let compressed = mem::take(encoder.get_mut());
                self.emit(entry, &compressed)?;
                entry.crc.update(buf);
            }
        }
        entry.written += buf.len() as u64;
        Ok(())
    }
}

impl<W: Write> Write for ZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_entry_data(buf).map_err(Error::into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        if result.is_err() {
            self.failed = true;
        }
        result
    }
}

fn require<T>(value: Option<T>, name: &str, field: &'static str) -> Result<T> {
    value.ok_or_else(|| Error::MissingEntryMetadata {
        entry_name: name.to_string(),
        field,
    })
}

fn check_zip32(size: u64) -> Result<()> {
    if size >= ZIP64_SENTINEL_U32 as u64 {
        return Err(Error::UnsupportedFeature {
            feature: "zip64 entry sizes",
        });
    }
    Ok(())
}

fn utf8_flag(entry: &ZipEntry) -> u16 {
    let comment_ascii = entry.comment.as_deref().is_none_or(str::is_ascii);
    if entry.name.is_ascii() && comment_ascii {
        0
    } else {
        flags::UTF8
    }
}

/// "Version needed to extract" for a raw-copied method.
fn version_needed(method: CompressionMethod) -> u16 {
    match method {
        CompressionMethod::Stored => VERSION_STORED,
        CompressionMethod::Deflated => VERSION_DEFLATE,
        CompressionMethod::Other(9) => 21,
        CompressionMethod::Other(12) => 46,
        CompressionMethod::Other(14) => 63,
        CompressionMethod::Other(_) => VERSION_DEFLATE,
    }
}
