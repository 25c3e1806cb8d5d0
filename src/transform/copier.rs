//! Verbatim entry copies.

use std::io::{Read, Write};

use crate::entry::ZipEntry;
use crate::entry_name::SanitizedName;
use crate::read::ZipReader;
use crate::write::ZipWriter;
use crate::{Error, Result};

/// Copies the current entry of `reader` to `writer` under `name`.
///
/// Method, size, CRC, timestamp, extra field and comment carry over; only
/// the compressed size is left for the writer to recompute. Entries the
/// reader cannot decode are copied as raw bytes with their metadata intact.
/// `buffer` is the caller's scratch space and is not retained.
pub(crate) fn copy_entry<R: Read, W: Write>(
    entry: &ZipEntry,
    name: &SanitizedName,
    reader: &mut ZipReader<R>,
    writer: &mut ZipWriter<W>,
    buffer: &mut [u8],
) -> Result<()> {
    let mut output = entry.clone();
    output.name = name.as_str().to_owned();
    if entry.can_decode() {
        output.compressed_size = None;
        output.flags = 0;
        writer.start_entry(&output)?;
    } else {
        writer.start_raw_entry(&output)?;
    }

    loop {
        let n = reader.read(buffer).map_err(Error::from_io)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).map_err(Error::from_io)?;
    }
    writer.close_entry()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Crc32;
    use crate::entry::CompressionMethod;
    use crate::entry_name::sanitize;
    use std::io::Cursor;

    #[test]
    fn test_copy_preserves_metadata() {
        let data = b"stored bytes";
        let mut source = ZipWriter::new(Vec::new());
        let mut entry = ZipEntry::new("dir/../a.txt").with_method(CompressionMethod::Stored);
        entry.size = Some(data.len() as u64);
        entry.crc32 = Some(Crc32::compute(data));
        entry.extra = vec![0xfe, 0xca, 0x00, 0x00];
        source.start_entry(&entry).unwrap();
        source.write_all(data).unwrap();
        let input = source.finish().unwrap();

        let mut reader = ZipReader::new(&input[..]);
        let mut writer = ZipWriter::new(Vec::new());
        let mut buffer = [0u8; 4];
        let read = reader.next_entry().unwrap().unwrap();
        let name = sanitize(&read.name).unwrap();
        copy_entry(&read, &name, &mut reader, &mut writer, &mut buffer).unwrap();
        let output = writer.finish().unwrap();

        let mut check = ZipReader::with_index(Cursor::new(output)).unwrap();
        let copied = check.next_entry().unwrap().unwrap();
        assert_eq!(copied.name, "a.txt");
        assert_eq!(copied.method, CompressionMethod::Stored);
        assert_eq!(copied.size, Some(data.len() as u64));
        assert_eq!(copied.crc32, entry.crc32);
        assert_eq!(copied.extra, entry.extra);
        let mut content = Vec::new();
        check.read_to_end(&mut content).unwrap();
        assert_eq!(content, data);
    }
}
