//! Zip record structures and their little-endian encoding.
//!
//! Readers here expect the 4-byte signature to have been consumed already,
//! since the caller needs the signature to decide which record follows.
//! Writers emit the signature.

use std::io::{self, Read, Write};

use crate::entry::DosDateTime;

use super::{
    CENTRAL_DIRECTORY_HEADER_LEN, CENTRAL_DIRECTORY_SIGNATURE, DATA_DESCRIPTOR_SIGNATURE,
    END_OF_CENTRAL_DIRECTORY_LEN, END_OF_CENTRAL_DIRECTORY_SIGNATURE, LOCAL_FILE_HEADER_LEN,
    LOCAL_FILE_HEADER_SIGNATURE, ZIP64_SENTINEL_U16, ZIP64_SENTINEL_U32,
};

/// Sequential little-endian field decoder over a fixed-size record.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let b = &self.buf[self.pos..self.pos + 4];
        self.pos += 4;
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }
}

/// Reads a little-endian u32.
pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_vec<R: Read + ?Sized>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn len_u16(len: usize, what: &str) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is {} bytes, more than a zip record can hold", what, len),
        )
    })
}

/// Local file header preceding each entry's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method id.
    pub method: u16,
    /// Last modification time.
    pub modified: DosDateTime,
    /// CRC-32, zero when deferred to a data descriptor.
    pub crc32: u32,
    /// Compressed size, zero when deferred to a data descriptor.
    pub compressed_size: u32,
    /// Uncompressed size, zero when deferred to a data descriptor.
    pub uncompressed_size: u32,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Raw extra field bytes.
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Reads the header body following the signature.
    pub fn read_body<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let mut fixed = [0u8; LOCAL_FILE_HEADER_LEN];
        r.read_exact(&mut fixed)?;
        let mut f = Fields::new(&fixed);
        let version_needed = f.u16();
        let flags = f.u16();
        let method = f.u16();
        let time = f.u16();
        let date = f.u16();
        let crc32 = f.u32();
        let compressed_size = f.u32();
        let uncompressed_size = f.u32();
        let name_len = f.u16() as usize;
        let extra_len = f.u16() as usize;
        let name = read_vec(r, name_len)?;
        let extra = read_vec(r, extra_len)?;
        Ok(Self {
            version_needed,
            flags,
            method,
            modified: DosDateTime { date, time },
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    /// Returns true if any size field holds the zip64 sentinel.
    pub fn has_zip64_sizes(&self) -> bool {
        self.compressed_size == ZIP64_SENTINEL_U32 || self.uncompressed_size == ZIP64_SENTINEL_U32
    }

    /// Writes the header including its signature.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let name_len = len_u16(self.name.len(), "entry name")?;
        let extra_len = len_u16(self.extra.len(), "extra field")?;
        let mut buf = Vec::with_capacity(30 + self.name.len() + self.extra.len());
        buf.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&self.version_needed.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.method.to_le_bytes());
        buf.extend_from_slice(&self.modified.time.to_le_bytes());
        buf.extend_from_slice(&self.modified.date.to_le_bytes());
        buf.extend_from_slice(&self.crc32.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(&extra_len.to_le_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.extra);
        w.write_all(&buf)
    }
}

/// Central directory record for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryHeader {
    /// Version made by (host system in the high byte).
    pub version_made_by: u16,
    /// Version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method id.
    pub method: u16,
    /// Last modification time.
    pub modified: DosDateTime,
    /// CRC-32.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Raw extra field bytes.
    pub extra: Vec<u8>,
    /// Raw comment bytes.
    pub comment: Vec<u8>,
    /// Disk number where the entry starts.
    pub disk_start: u16,
    /// Internal file attributes.
    pub internal_attributes: u16,
    /// External file attributes (host dependent).
    pub external_attributes: u32,
    /// Offset of the local header from the start of the archive.
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    /// Reads the header body following the signature.
    pub fn read_body<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let mut fixed = [0u8; CENTRAL_DIRECTORY_HEADER_LEN];
        r.read_exact(&mut fixed)?;
        let mut f = Fields::new(&fixed);
        let version_made_by = f.u16();
        let version_needed = f.u16();
        let flags = f.u16();
        let method = f.u16();
        let time = f.u16();
        let date = f.u16();
        let crc32 = f.u32();
        let compressed_size = f.u32();
        let uncompressed_size = f.u32();
        let name_len = f.u16() as usize;
        let extra_len = f.u16() as usize;
        let comment_len = f.u16() as usize;
        let disk_start = f.u16();
        let internal_attributes = f.u16();
        let external_attributes = f.u32();
        let local_header_offset = f.u32();
        let name = read_vec(r, name_len)?;
        let extra = read_vec(r, extra_len)?;
        let comment = read_vec(r, comment_len)?;
        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: DosDateTime { date, time },
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
            comment,
            disk_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
        })
    }

    /// Writes the header including its signature.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let name_len = len_u16(self.name.len(), "entry name")?;
        let extra_len = len_u16(self.extra.len(), "extra field")?;
        let comment_len = len_u16(self.comment.len(), "entry comment")?;
        let mut buf =
            Vec::with_capacity(46 + self.name.len() + self.extra.len() + self.comment.len());
        buf.extend_from_slice(&CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&self.version_made_by.to_le_bytes());
        buf.extend_from_slice(&self.version_needed.to_le_bytes());
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.method.to_le_bytes());
        buf.extend_from_slice(&self.modified.time.to_le_bytes());
        buf.extend_from_slice(&self.modified.date.to_le_bytes());
        buf.extend_from_slice(&self.crc32.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        buf.extend_from_slice(&name_len.to_le_bytes());
        buf.extend_from_slice(&extra_len.to_le_bytes());
        buf.extend_from_slice(&comment_len.to_le_bytes());
        buf.extend_from_slice(&self.disk_start.to_le_bytes());
        buf.extend_from_slice(&self.internal_attributes.to_le_bytes());
        buf.extend_from_slice(&self.external_attributes.to_le_bytes());
        buf.extend_from_slice(&self.local_header_offset.to_le_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.extra);
        buf.extend_from_slice(&self.comment);
        w.write_all(&buf)
    }
}

/// End of central directory record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub central_directory_disk: u16,
    /// Central directory entries on this disk.
    pub disk_entries: u16,
    /// Total central directory entries.
    pub total_entries: u16,
    /// Size of the central directory in bytes.
    pub central_directory_size: u32,
    /// Offset of the central directory from the start of the archive.
    pub central_directory_offset: u32,
    /// Archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    /// Reads the record body following the signature.
    pub fn read_body<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let mut fixed = [0u8; END_OF_CENTRAL_DIRECTORY_LEN];
        r.read_exact(&mut fixed)?;
        let mut f = Fields::new(&fixed);
        let disk_number = f.u16();
        let central_directory_disk = f.u16();
        let disk_entries = f.u16();
        let total_entries = f.u16();
        let central_directory_size = f.u32();
        let central_directory_offset = f.u32();
        let comment_len = f.u16() as usize;
        let comment = read_vec(r, comment_len)?;
        Ok(Self {
            disk_number,
            central_directory_disk,
            disk_entries,
            total_entries,
            central_directory_size,
            central_directory_offset,
            comment,
        })
    }

    /// Returns true if the record defers to a zip64 record.
    pub fn is_zip64(&self) -> bool {
        self.total_entries == ZIP64_SENTINEL_U16
            || self.disk_entries == ZIP64_SENTINEL_U16
            || self.central_directory_size == ZIP64_SENTINEL_U32
            || self.central_directory_offset == ZIP64_SENTINEL_U32
    }

    /// Returns true if the record spans multiple disks.
    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.central_directory_disk != 0
    }

    /// Writes the record including its signature.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let comment_len = len_u16(self.comment.len(), "archive comment")?;
        let mut buf = Vec::with_capacity(22 + self.comment.len());
        buf.extend_from_slice(&END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes());
        buf.extend_from_slice(&self.disk_number.to_le_bytes());
        buf.extend_from_slice(&self.central_directory_disk.to_le_bytes());
        buf.extend_from_slice(&self.disk_entries.to_le_bytes());
        buf.extend_from_slice(&self.total_entries.to_le_bytes());
        buf.extend_from_slice(&self.central_directory_size.to_le_bytes());
        buf.extend_from_slice(&self.central_directory_offset.to_le_bytes());
        buf.extend_from_slice(&comment_len.to_le_bytes());
        buf.extend_from_slice(&self.comment);
        w.write_all(&buf)
    }
}

/// Data descriptor trailing an entry written with flag bit 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    /// CRC-32 of the uncompressed bytes.
    pub crc32: u32,
    /// Compressed size.
    pub compressed_size: u32,
    /// Uncompressed size.
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    /// Reads a descriptor, with or without its optional signature.
    pub fn read<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let first = read_u32(r)?;
        let crc32 = if first == DATA_DESCRIPTOR_SIGNATURE {
            read_u32(r)?
        } else {
            first
        };
        let compressed_size = read_u32(r)?;
        let uncompressed_size = read_u32(r)?;
        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }

    /// Writes the descriptor with its signature.
    pub fn write<W: Write + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        let mut buf = [0u8; 16];
        buf[0..4].copy_from_slice(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes());
        buf[4..8].copy_from_slice(&self.crc32.to_le_bytes());
        buf[8..12].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.uncompressed_size.to_le_bytes());
        w.write_all(&buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_local() -> LocalFileHeader {
        LocalFileHeader {
            version_needed: 20,
            flags: 0x0808,
            method: 8,
            modified: DosDateTime::from_parts(2023, 6, 1, 12, 0, 0),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            name: b"dir/file.txt".to_vec(),
            extra: vec![0x55, 0x54, 0x01, 0x00, 0x00],
        }
    }

    #[test]
    fn test_local_header_layout() {
        let header = sample_local();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 30 + 12 + 5);
        assert_eq!(&buf[0..4], b"PK\x03\x04");
        // name length at offset 26
        assert_eq!(u16::from_le_bytes([buf[26], buf[27]]), 12);

        let mut cursor = Cursor::new(&buf[4..]);
        assert_eq!(LocalFileHeader::read_body(&mut cursor).unwrap(), header);
    }

    #[test]
    fn test_truncated_local_header() {
        let header = sample_local();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        let mut cursor = Cursor::new(&buf[4..20]);
        let err = LocalFileHeader::read_body(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_name_rejected_on_write() {
        let mut header = sample_local();
        header.name = vec![b'a'; u16::MAX as usize + 1];
        let err = header.write(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_central_header_layout() {
        let header = CentralDirectoryHeader {
            version_made_by: 0x031e,
            version_needed: 20,
            flags: 0,
            method: 0,
            modified: DosDateTime::default(),
            crc32: 0xdeadbeef,
            compressed_size: 5,
            uncompressed_size: 5,
            name: b"a".to_vec(),
            extra: Vec::new(),
            comment: b"hi".to_vec(),
            disk_start: 0,
            internal_attributes: 1,
            external_attributes: 0o100644 << 16,
            local_header_offset: 1234,
        };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 46 + 1 + 2);
        let parsed = CentralDirectoryHeader::read_body(&mut &buf[4..]).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_eocd_zip64_detection() {
        let mut eocd = EndOfCentralDirectory::default();
        assert!(!eocd.is_zip64());
        eocd.central_directory_offset = ZIP64_SENTINEL_U32;
        assert!(eocd.is_zip64());
    }

    #[test]
    fn test_data_descriptor_with_and_without_signature() {
        let dd = DataDescriptor {
            crc32: 7,
            compressed_size: 8,
            uncompressed_size: 9,
        };
        let mut signed = Vec::new();
        dd.write(&mut signed).unwrap();
        assert_eq!(DataDescriptor::read(&mut &signed[..]).unwrap(), dd);

        let unsigned = &signed[4..];
        assert_eq!(DataDescriptor::read(&mut &unsigned[..]).unwrap(), dd);
    }
}
