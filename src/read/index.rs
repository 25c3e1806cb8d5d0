//! Central directory pre-scan for seekable inputs.
//!
//! Local headers carry neither entry comments nor file attributes, and
//! entries written with a data descriptor do not know their sizes up front.
//! When the input can seek, the central directory at the end of the archive
//! fills those gaps. It also tells the sequential walk which local entries
//! actually belong to the archive, and how many prefix bytes (for example a
//! self-extractor stub) precede the first entry.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use crate::entry::{CompressionMethod, DosDateTime};
use crate::format::header::{CentralDirectoryHeader, EndOfCentralDirectory};
use crate::format::{
    CENTRAL_DIRECTORY_SIGNATURE, END_OF_CENTRAL_DIRECTORY_LEN, END_OF_CENTRAL_DIRECTORY_SIGNATURE,
    MAX_END_OF_CENTRAL_DIRECTORY_LEN,
};
use crate::{Error, Result};

/// Central directory facts about one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// Name as recorded in the central directory.
    pub name: String,
    /// Compression method.
    pub method: CompressionMethod,
    /// CRC-32 of the uncompressed bytes.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u64,
    /// Uncompressed size.
    pub size: u64,
    /// Last modification time.
    pub modified: DosDateTime,
    /// Entry comment, `None` when empty.
    pub comment: Option<String>,
    /// "Version made by".
    pub version_made_by: u16,
    /// External file attributes.
    pub external_attributes: u32,
}

impl From<CentralDirectoryHeader> for IndexRecord {
    fn from(header: CentralDirectoryHeader) -> Self {
        let comment = if header.comment.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&header.comment).into_owned())
        };
        Self {
            name: String::from_utf8_lossy(&header.name).into_owned(),
            method: CompressionMethod::from_id(header.method),
            crc32: header.crc32,
            compressed_size: header.compressed_size as u64,
            size: header.uncompressed_size as u64,
            modified: header.modified,
            comment,
            version_made_by: header.version_made_by,
            external_attributes: header.external_attributes,
        }
    }
}

/// Entries of a central directory keyed by the absolute offset of their
/// local header in the input.
#[derive(Debug, Clone, Default)]
pub struct CentralIndex {
    records: BTreeMap<u64, IndexRecord>,
    prefix: u64,
    central_directory_start: u64,
    comment: String,
}

impl CentralIndex {
    /// Locates and parses the central directory of `reader`.
    ///
    /// Leaves `reader` positioned at its start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if no end of central directory record
    /// is found, [`Error::UnsupportedFeature`] for zip64 or multi-disk
    /// archives, and [`Error::CorruptHeader`] if the directory does not fit
    /// the input.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        let min_len = (4 + END_OF_CENTRAL_DIRECTORY_LEN) as u64;
        if len < min_len {
            return Err(Error::InvalidFormat(format!(
                "input is {} bytes, too short for a zip archive",
                len
            )));
        }

        let window_len = len.min(MAX_END_OF_CENTRAL_DIRECTORY_LEN as u64);
        let window_start = len - window_len;
        reader.seek(SeekFrom::Start(window_start))?;
        let mut window = vec![0u8; window_len as usize];
        reader.read_exact(&mut window)?;

        let eocd_rel = find_end_record(&window).ok_or_else(|| {
            Error::InvalidFormat("end of central directory record not found".into())
        })?;
        let eocd = EndOfCentralDirectory::read_body(&mut &window[eocd_rel + 4..])?;
        if eocd.is_zip64() {
            return Err(Error::UnsupportedFeature { feature: "zip64" });
        }
        if eocd.is_multi_disk() {
            return Err(Error::UnsupportedFeature {
                feature: "multi-disk archive",
            });
        }

        let eocd_pos = window_start + eocd_rel as u64;
        let cd_size = eocd.central_directory_size as u64;
        let cd_end = eocd.central_directory_offset as u64 + cd_size;
        if cd_end > eocd_pos {
            return Err(Error::CorruptHeader {
                offset: eocd_pos,
                reason: format!(
                    "central directory ends at {:#x}, past its end record",
                    cd_end
                ),
            });
        }
        // Bytes in front of the archive shift every recorded offset.
        let prefix = eocd_pos - cd_end;
        let central_directory_start = prefix + eocd.central_directory_offset as u64;

        reader.seek(SeekFrom::Start(central_directory_start))?;
        let mut directory = vec![0u8; cd_size as usize];
        reader.read_exact(&mut directory)?;

        let mut records = BTreeMap::new();
        let mut cursor = &directory[..];
        for index in 0..eocd.total_entries {
            let offset = central_directory_start + (directory.len() - cursor.len()) as u64;
            let corrupt = |reason: String| Error::CorruptHeader { offset, reason };
            if cursor.len() < 4 || cursor[..4] != CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes() {
                return Err(corrupt(format!(
                    "central directory record {} of {} missing",
                    index + 1,
                    eocd.total_entries
                )));
            }
            cursor = &cursor[4..];
            let header = CentralDirectoryHeader::read_body(&mut cursor)
                .map_err(|e| corrupt(format!("truncated central directory record: {}", e)))?;
            let local = prefix + header.local_header_offset as u64;
            if local >= central_directory_start {
                return Err(corrupt(format!(
                    "local header offset {:#x} points into the central directory",
                    local
                )));
            }
            records.insert(local, IndexRecord::from(header));
        }

        reader.seek(SeekFrom::Start(0))?;
        Ok(Self {
            records,
            prefix,
            central_directory_start,
            comment: String::from_utf8_lossy(&eocd.comment).into_owned(),
        })
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bytes preceding the archive proper.
    pub fn prefix(&self) -> u64 {
        self.prefix
    }

    /// Absolute offset of the central directory.
    pub fn central_directory_start(&self) -> u64 {
        self.central_directory_start
    }

    /// Archive comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns the record for the local header at `offset`.
    pub fn get(&self, offset: u64) -> Option<&IndexRecord> {
        self.records.get(&offset)
    }

    /// Returns the first indexed local header offset at or after `offset`.
    pub fn next_offset(&self, offset: u64) -> Option<u64> {
        self.records.range(offset..).next().map(|(&o, _)| o)
    }

    /// Iterates records in local header order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &IndexRecord)> {
        self.records.iter().map(|(&o, r)| (o, r))
    }
}

/// Finds the last plausible end record in `window`.
fn find_end_record(window: &[u8]) -> Option<usize> {
    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    let fixed = 4 + END_OF_CENTRAL_DIRECTORY_LEN;
    if window.len() < fixed {
        return None;
    }
    (0..=window.len() - fixed).rev().find(|&i| {
        if window[i..i + 4] != signature {
            return false;
        }
        let comment_len = u16::from_le_bytes([window[i + 20], window[i + 21]]) as usize;
        i + fixed + comment_len <= window.len()
    })
}
