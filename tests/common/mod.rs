//! Shared test utilities for integration tests.
//!
//! This module provides archive builders, readers and test actions used
//! across multiple test files.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};

use rezip::checksum::Crc32;
use rezip::{
    Action, ByteData, ChangeRecord, CompressionMethod, DosDateTime, Error, TransformContext,
    ZipEntry, ZipReader, ZipWriter,
};

/// Creates an in-memory archive of deflated entries.
pub fn create_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    for (name, data) in entries {
        writer.start_entry(&ZipEntry::new(*name)).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap()
}

/// Creates an in-memory archive of stored entries.
pub fn create_stored_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Vec::new());
    for (name, data) in entries {
        writer.start_entry(&stored_entry(name, data)).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap()
}

/// Creates a stored entry header for `data`.
pub fn stored_entry(name: &str, data: &[u8]) -> ZipEntry {
    let mut entry = ZipEntry::new(name).with_method(CompressionMethod::Stored);
    entry.size = Some(data.len() as u64);
    entry.crc32 = Some(Crc32::compute(data));
    entry.modified = DosDateTime::from_parts(2021, 6, 15, 12, 30, 44);
    entry
}

/// Reads every entry listed in the central directory and its decoded content.
///
/// Entries aborted by the writer are still present as local records; going
/// through the index skips them.
pub fn read_entries(bytes: &[u8]) -> Vec<(ZipEntry, Vec<u8>)> {
    let mut reader = ZipReader::with_index(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        entries.push((entry, data));
    }
    entries
}

/// Reads every local entry front to back, without the central directory.
pub fn read_local_entries(bytes: &[u8]) -> Vec<(ZipEntry, Vec<u8>)> {
    let mut reader = ZipReader::new(bytes);
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).unwrap();
        entries.push((entry, data));
    }
    entries
}

/// Returns the entry names in archive order.
pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    read_entries(bytes)
        .into_iter()
        .map(|(entry, _)| entry.name)
        .collect()
}

/// Returns the decoded content of entry `name`.
pub fn entry_data(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    read_entries(bytes)
        .into_iter()
        .find(|(entry, _)| entry.name == name)
        .map(|(_, data)| data)
}

/// Buffered action failing with a transform error on names containing
/// `poison`, and uppercasing everything else.
#[derive(Debug)]
pub struct PoisonAction;

impl Action for PoisonAction {
    fn name(&self) -> &str {
        "poison"
    }

    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".txt")
    }

    fn transform_buffer(&self, name: &str, data: &[u8]) -> rezip::Result<ByteData> {
        if name.contains("poison") {
            return Err(Error::transform(name, "refusing poisoned content"));
        }
        Ok(ByteData::new(name, data.to_ascii_uppercase()))
    }
}

/// Buffered action failing with an error that is not a transform error.
#[derive(Debug)]
pub struct BrokenAction;

impl Action for BrokenAction {
    fn name(&self) -> &str {
        "broken"
    }

    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".bin")
    }

    fn transform_buffer(&self, name: &str, _data: &[u8]) -> rezip::Result<ByteData> {
        Err(Error::MissingEntryMetadata {
            entry_name: name.to_string(),
            field: "payload",
        })
    }
}

/// Streaming action reversing the bytes of `.rev` entries.
///
/// Fails halfway through entries whose name contains `fail`.
#[derive(Debug)]
pub struct ReverseStreamAction;

impl Action for ReverseStreamAction {
    fn name(&self) -> &str {
        "reverse"
    }

    fn accepts(&self, name: &str) -> bool {
        name.ends_with(".rev")
    }

    fn uses_streams(&self) -> bool {
        true
    }

    fn relocate(&self, name: &str) -> String {
        format!("{}.out", name)
    }

    fn transform_stream(
        &self,
        _ctx: &TransformContext<'_>,
        name: &str,
        input: &mut dyn Read,
        _declared_len: Option<u64>,
        output: &mut dyn Write,
    ) -> rezip::Result<Option<ChangeRecord>> {
        let mut data = Vec::new();
        input.read_to_end(&mut data).map_err(Error::from_io)?;
        data.reverse();
        if name.contains("fail") {
            output
                .write_all(&data[..data.len() / 2])
                .map_err(Error::from_io)?;
            return Err(Error::transform(name, "stream ended early"));
        }
        output.write_all(&data).map_err(Error::from_io)?;
        Ok(None)
    }
}

/// Reader failing with an I/O error after `limit` bytes.
pub struct FailingReader<'a> {
    data: &'a [u8],
    limit: usize,
}

impl<'a> FailingReader<'a> {
    pub fn new(data: &'a [u8], limit: usize) -> Self {
        Self { data, limit }
    }
}

impl Read for FailingReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.limit == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "input gone"));
        }
        let n = buf.len().min(self.limit).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        self.limit -= n;
        Ok(n)
    }
}

/// Writer failing with an I/O error once `limit` bytes were accepted.
#[derive(Default)]
pub struct FailingWriter {
    pub written: Vec<u8>,
    limit: usize,
}

impl FailingWriter {
    pub fn new(limit: usize) -> Self {
        Self {
            written: Vec::new(),
            limit,
        }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.limit - self.written.len();
        if room == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let n = buf.len().min(room);
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
