//! Per-entry accept, select and transform policy.

use std::io::{Read, Write};

use log::error;

use super::copier::copy_entry;
use super::record::{ChangeRecord, TransformOutcome};
use crate::action::{Action, ByteData, TransformContext};
use crate::checksum::Crc32;
use crate::entry::{CompressionMethod, ZipEntry};
use crate::entry_name::{SanitizedName, sanitize};
use crate::read::ZipReader;
use crate::write::ZipWriter;
use crate::{Error, Result};

/// Everything one entry dispatch works with.
pub(crate) struct Dispatch<'c, 'a, R: Read, W: Write> {
    pub ctx: &'c TransformContext<'a>,
    pub reader: &'c mut ZipReader<R>,
    pub writer: &'c mut ZipWriter<W>,
    pub buffer: &'c mut [u8],
    pub record: &'c mut ChangeRecord,
}

impl<R: Read, W: Write> Dispatch<'_, '_, R, W> {
    /// Routes the current entry and records what happened to it.
    ///
    /// On error nothing is recorded and an output entry may still be open;
    /// the caller decides whether the failure is fatal.
    pub(crate) fn run(&mut self, entry: &ZipEntry, name: &SanitizedName) -> Result<TransformOutcome> {
        let input = name.as_str();

        let action = if entry.can_decode() {
            self.ctx.registry().action_for(input)
        } else {
            None
        };
        let Some(action) = action else {
            return self.copy(entry, name, TransformOutcome::CopiedUnaccepted);
        };
        if !action.selects(input) {
            return self.copy(entry, name, TransformOutcome::CopiedUnselected);
        }
        if action.uses_streams() {
            self.transform_streaming(action, entry, name)
        } else {
            self.transform_buffered(action, entry, name)
        }
    }

    fn copy(
        &mut self,
        entry: &ZipEntry,
        name: &SanitizedName,
        outcome: TransformOutcome,
    ) -> Result<TransformOutcome> {
        copy_entry(entry, name, self.reader, self.writer, self.buffer)?;
        self.record
            .record(name.as_str(), Some(name.as_str().to_owned()), outcome);
        Ok(outcome)
    }

    fn transform_streaming(
        &mut self,
        action: &dyn Action,
        entry: &ZipEntry,
        name: &SanitizedName,
    ) -> Result<TransformOutcome> {
        let input = name.as_str();
        let output_name = sanitize(&action.relocate(input))?;
        // The transform may change the length, so sizes are left to the writer.
        let output = entry.derive(output_name.as_str(), CompressionMethod::Deflated);
        self.writer.start_entry(&output)?;
        let nested = action.transform_stream(
            self.ctx,
            input,
            &mut *self.reader,
            entry.size,
            &mut *self.writer,
        )?;
        self.writer.close_entry()?;

        if let Some(nested) = nested {
            self.record.attach_nested(output_name.as_str(), nested);
        }
        let outcome = TransformOutcome::TransformedStreaming;
        self.record
            .record(input, Some(output_name.into_string()), outcome);
        Ok(outcome)
    }

    fn transform_buffered(
        &mut self,
        action: &dyn Action,
        entry: &ZipEntry,
        name: &SanitizedName,
    ) -> Result<TransformOutcome> {
        let input = name.as_str();
        let limit = self.ctx.options().max_preallocation as u64;
        let capacity = entry.size.map_or(0, |size| size.min(limit)) as usize;
        let mut data = Vec::with_capacity(capacity);
        self.reader.read_to_end(&mut data).map_err(Error::from_io)?;

        let (result, outcome) = match action.transform_buffer(input, &data) {
            Ok(result) => (result, TransformOutcome::TransformedBuffered),
            Err(e) if e.is_transform() => {
                error!(
                    "action '{}' failed on '{}', keeping original bytes: {}",
                    action.name(),
                    input,
                    e
                );
                (
                    ByteData::new(input, data),
                    TransformOutcome::TransformedWithFallback,
                )
            }
            Err(e) => return Err(e),
        };

        let output_name = sanitize(&result.name)?;
        let mut output = entry.derive(output_name.as_str(), entry.method);
        if output.method == CompressionMethod::Stored {
            // Stored entries carry their own integrity data.
            let len = result.data.len() as u64;
            output.size = Some(len);
            output.compressed_size = Some(len);
            output.crc32 = Some(Crc32::compute(&result.data));
        }
        self.writer.start_entry(&output)?;
        self.writer
            .write_all(&result.data)
            .map_err(Error::from_io)?;
        self.writer.close_entry()?;

        self.record
            .record(input, Some(output_name.into_string()), outcome);
        Ok(outcome)
    }
}
