//! Zip entry metadata.

use crate::format::flags;

/// Compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Method 0: bytes are stored uncompressed.
    Stored,
    /// Method 8: raw deflate.
    Deflated,
    /// Any other method id. Such entries can only be copied verbatim.
    Other(u16),
}

impl CompressionMethod {
    /// Maps a raw method id.
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => Self::Stored,
            8 => Self::Deflated,
            other => Self::Other(other),
        }
    }

    /// Returns the raw method id.
    pub fn id(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflated => 8,
            Self::Other(id) => id,
        }
    }

    /// Returns true if this crate can decode and encode the method.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Stored | Self::Deflated)
    }
}

/// MS-DOS date and time as stored in zip headers.
///
/// Kept in raw form so that copied entries keep their exact timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    /// Raw DOS date: bits 9-15 year since 1980, 5-8 month, 0-4 day.
    pub date: u16,
    /// Raw DOS time: bits 11-15 hour, 5-10 minute, 0-4 seconds / 2.
    pub time: u16,
}

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the DOS epoch.
    fn default() -> Self {
        Self {
            date: (1 << 5) | 1,
            time: 0,
        }
    }
}

impl DosDateTime {
    /// Creates a timestamp from calendar fields.
    ///
    /// Years outside 1980-2107 are clamped; seconds are rounded down to even.
    pub fn from_parts(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let year = year.clamp(1980, 2107) - 1980;
        let date = (year << 9) | ((month as u16 & 0x0f) << 5) | (day as u16 & 0x1f);
        let time = ((hour as u16 & 0x1f) << 11)
            | ((minute as u16 & 0x3f) << 5)
            | ((second as u16 / 2) & 0x1f);
        Self { date, time }
    }

    /// Calendar year.
    pub fn year(&self) -> u16 {
        1980 + (self.date >> 9)
    }

    /// Month, 1-12.
    pub fn month(&self) -> u8 {
        ((self.date >> 5) & 0x0f) as u8
    }

    /// Day of month, 1-31.
    pub fn day(&self) -> u8 {
        (self.date & 0x1f) as u8
    }

    /// Hour, 0-23.
    pub fn hour(&self) -> u8 {
        (self.time >> 11) as u8
    }

    /// Minute, 0-59.
    pub fn minute(&self) -> u8 {
        ((self.time >> 5) & 0x3f) as u8
    }

    /// Second, 0-58 in steps of two.
    pub fn second(&self) -> u8 {
        ((self.time & 0x1f) * 2) as u8
    }
}

/// Metadata of one container entry.
///
/// Produced by [`ZipReader::next_entry`] (one per iteration step) and
/// consumed by [`ZipWriter::start_entry`]. Sizes and CRC are `None` when not
/// known up front, e.g. for deflated entries followed by a data descriptor.
///
/// [`ZipReader::next_entry`]: crate::read::ZipReader::next_entry
/// [`ZipWriter::start_entry`]: crate::write::ZipWriter::start_entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Entry name exactly as stored; untrusted when read from an archive.
    pub name: String,
    /// Compression method.
    pub method: CompressionMethod,
    /// Declared uncompressed size.
    pub size: Option<u64>,
    /// Declared compressed size.
    pub compressed_size: Option<u64>,
    /// CRC-32 of the uncompressed bytes.
    pub crc32: Option<u32>,
    /// Extra field bytes from the local header.
    pub extra: Vec<u8>,
    /// Entry comment, only known when the central directory was indexed.
    pub comment: Option<String>,
    /// Last modification time.
    pub modified: DosDateTime,
    /// General purpose bit flags as read.
    pub flags: u16,
    /// "Version made by" from the central directory, 0 if unknown.
    pub version_made_by: u16,
    /// External file attributes from the central directory, 0 if unknown.
    pub external_attributes: u32,
}

impl ZipEntry {
    /// Creates a deflated entry with unknown sizes and the DOS epoch timestamp.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: CompressionMethod::Deflated,
            size: None,
            compressed_size: None,
            crc32: None,
            extra: Vec::new(),
            comment: None,
            modified: DosDateTime::default(),
            flags: 0,
            version_made_by: 0,
            external_attributes: 0,
        }
    }

    /// Sets the compression method.
    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.method = method;
        self
    }

    /// Returns true for directory markers.
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Returns true if the entry data is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Returns true if a data descriptor follows the entry data.
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & flags::DATA_DESCRIPTOR != 0
    }

    /// Returns true if the entry bytes can be decoded.
    ///
    /// Entries that cannot be decoded are exposed raw and can only be copied
    /// verbatim.
    pub fn can_decode(&self) -> bool {
        self.method.is_supported() && !self.is_encrypted()
    }

    /// Builds the metadata for an output entry derived from this one.
    ///
    /// Keeps timestamp, extra field, comment and attributes; sizes and CRC
    /// are left for the writer to derive.
    pub fn derive(&self, name: impl Into<String>, method: CompressionMethod) -> Self {
        Self {
            name: name.into(),
            method,
            size: None,
            compressed_size: None,
            crc32: None,
            extra: self.extra.clone(),
            comment: self.comment.clone(),
            modified: self.modified,
            flags: 0,
            version_made_by: self.version_made_by,
            external_attributes: self.external_attributes,
        }
    }
}
