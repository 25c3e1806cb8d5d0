//! Zip container constants and record layouts.
//!
//! The zip family (zip, jar, war, ear, ...) is a sequence of local entries,
//! each a local file header followed by entry data and an optional data
//! descriptor, closed by a central directory and an end-of-central-directory
//! record. All integers are little-endian.

pub mod header;

/// Local file header signature, `PK\x03\x04`.
pub const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// Central directory file header signature, `PK\x01\x02`.
pub const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201_4b50;

/// End of central directory signature, `PK\x05\x06`.
pub const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4b50;

/// Zip64 end of central directory signature, `PK\x06\x06`.
pub const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0606_4b50;

/// Data descriptor signature, `PK\x07\x08` (optional on read).
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// Fixed part of the local file header after the signature.
pub const LOCAL_FILE_HEADER_LEN: usize = 26;

/// Fixed part of a central directory header after the signature.
pub const CENTRAL_DIRECTORY_HEADER_LEN: usize = 42;

/// Fixed part of the end of central directory record after the signature.
pub const END_OF_CENTRAL_DIRECTORY_LEN: usize = 18;

/// Largest possible end of central directory record (64 KiB comment).
pub const MAX_END_OF_CENTRAL_DIRECTORY_LEN: usize =
    4 + END_OF_CENTRAL_DIRECTORY_LEN + u16::MAX as usize;

/// Zip32 size/offset value that announces zip64 fields.
pub const ZIP64_SENTINEL_U32: u32 = 0xFFFF_FFFF;

/// Zip32 count value that announces zip64 fields.
pub const ZIP64_SENTINEL_U16: u16 = 0xFFFF;

/// "Version needed to extract" for stored entries.
pub const VERSION_STORED: u16 = 10;

/// "Version needed to extract" for deflate or data descriptors.
pub const VERSION_DEFLATE: u16 = 20;

/// "Version made by" written when the source entry has none (MS-DOS, 2.0).
pub const VERSION_MADE_BY_DEFAULT: u16 = 20;

/// General purpose bit flags.
pub mod flags {
    /// Bit 0: entry data is encrypted.
    pub const ENCRYPTED: u16 = 0x0001;
    /// Bit 3: CRC and sizes follow the data in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 0x0008;
    /// Bit 11: name and comment are UTF-8.
    pub const UTF8: u16 = 0x0800;
}

/// Returns true if `header` starts with a zip record signature.
///
/// Matches local file header, central directory, end of central directory
/// and data descriptor (spanned archive) signatures.
pub fn is_zip_magic(header: &[u8]) -> bool {
    if header.len() < 4 || header[0] != b'P' || header[1] != b'K' {
        return false;
    }
    matches!((header[2], header[3]), (1, 2) | (3, 4) | (5, 6) | (7, 8))
}
