//! The container transformation engine.
//!
//! A [`Transformer`] reads one archive entry by entry and writes a new
//! archive. Every entry name is sanitized first. The entry is then routed
//! by the [`ActionRegistry`]: copied verbatim when no action accepts it or
//! the accepting action does not select it, otherwise transformed as a
//! stream or as a buffer. Nested archives re-enter the engine through
//! [`ArchiveAction`](crate::ArchiveAction).
//!
//! # Failure handling
//!
//! Problems with a single entry (a hostile name, a failing streaming
//! action, a duplicate output name) are logged, recorded as
//! [`TransformOutcome::Failed`], and the entry is left out of the output.
//! Buffered actions failing with [`Error::Transform`] fall back to the
//! original bytes. Only failures of the container streams themselves abort
//! the archive, as an [`Error::Container`] naming where processing stopped.
//! The output is finalized on every path.
//!
//! A streaming entry that fails midway is dropped from the central
//! directory, but the bytes already written stay in the output as an
//! orphaned local record. Read rewritten archives back through
//! [`ZipReader::with_index`] to see only the entries that completed.
//!
//! # Example
//!
//! ```rust
//! use std::io::Write;
//! use rezip::{ActionSet, BufferedAction, Transformer, ZipEntry, ZipWriter};
//!
//! # fn main() -> rezip::Result<()> {
//! let mut input = ZipWriter::new(Vec::new());
//! input.start_entry(&ZipEntry::new("lib/Foo.class"))?;
//! input.write_all(b"\xca\xfe\xba\xbe")?;
//! input.start_entry(&ZipEntry::new("README.txt"))?;
//! input.write_all(b"read me")?;
//! let input = input.finish()?;
//!
//! let registry = ActionSet::new().with(
//!     BufferedAction::identity("classes")
//!         .with_extensions(["class"])
//!         .rename_prefix("lib/", "lib2/"),
//! );
//! let mut output = Vec::new();
//! let record = Transformer::new(&registry).process("app.jar", &input[..], &mut output)?;
//! assert_eq!(record.output_name_of("lib/Foo.class"), Some("lib2/Foo.class"));
//! assert_eq!(record.unaccepted(), 1);
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "parallel")]
mod batch;
mod copier;
mod dispatcher;
pub mod record;

#[cfg(feature = "parallel")]
pub use batch::BatchJob;
pub use record::{ChangeRecord, EntryRecord, TransformOutcome};

use std::io::{Read, Write};

use log::{debug, error, warn};

use crate::action::{ActionRegistry, TransformContext};
use crate::entry_name::sanitize;
use crate::error::ContainerPosition;
use crate::options::{MIN_COPY_BUFFER_SIZE, TransformOptions};
use crate::read::ZipReader;
use crate::write::ZipWriter;
use crate::{Error, Result};
use dispatcher::Dispatch;

/// Rewrites zip containers through an action registry.
///
/// Holds no per-archive state: one transformer can process any number of
/// archives, sequentially or (with the `parallel` feature) concurrently.
#[derive(Clone)]
pub struct Transformer<'a> {
    registry: &'a dyn ActionRegistry,
    options: TransformOptions,
    depth: usize,
}

impl std::fmt::Debug for Transformer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("options", &self.options)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'a> Transformer<'a> {
    /// Creates a transformer with default options.
    pub fn new(registry: &'a dyn ActionRegistry) -> Self {
        Self::with_options(registry, TransformOptions::default())
    }

    /// Creates a transformer with `options`.
    pub fn with_options(registry: &'a dyn ActionRegistry, options: TransformOptions) -> Self {
        Self {
            registry,
            options,
            depth: 0,
        }
    }

    /// Creates the transformer for an archive nested in the one `ctx`
    /// describes: same registry and options, one level deeper.
    pub fn nested(ctx: &TransformContext<'a>) -> Self {
        Self {
            registry: ctx.registry(),
            options: ctx.options().clone(),
            depth: ctx.depth() + 1,
        }
    }

    /// The options in effect.
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Nesting depth of the archives this transformer processes.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Transforms the archive read from `input` into `output`.
    ///
    /// `name` identifies the archive in logs, records and errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Container`] if reading the input or writing the
    /// output fails. Individual bad entries never fail the call; see the
    /// returned [`ChangeRecord`].
    pub fn process<R: Read, W: Write>(
        &self,
        name: &str,
        input: R,
        output: W,
    ) -> Result<ChangeRecord> {
        let (record, _) = self.process_archive(name, ZipReader::new(input), output)?;
        Ok(record)
    }

    /// Transforms the entries of an already opened reader.
    ///
    /// Use this with [`ZipReader::with_index`] for seekable inputs. Returns
    /// the record together with the output stream.
    pub fn process_archive<R: Read, W: Write>(
        &self,
        name: &str,
        mut reader: ZipReader<R>,
        output: W,
    ) -> Result<(ChangeRecord, W)> {
        let mut writer = ZipWriter::with_level(output, self.options.compression_level);
        let mut record = ChangeRecord::new(name);
        let walked = self.walk(name, &mut reader, &mut writer, &mut record);

        if let Err(error) = walked {
            // The output is finalized even though the archive failed.
            if let Err(finish_error) = writer.finish() {
                warn!(
                    "could not finalize output of '{}' after failure: {}",
                    name, finish_error
                );
            }
            return Err(error);
        }

        if self.options.preserve_archive_comment {
            if let Some(comment) = reader.archive_comment() {
                writer.set_comment(comment);
            }
        }
        let output = writer
            .finish()
            .map_err(|e| Error::container(name, ContainerPosition::Trailer, e))?;
        debug!("{}", record);
        Ok((record, output))
    }

    fn walk<R: Read, W: Write>(
        &self,
        archive: &str,
        reader: &mut ZipReader<R>,
        writer: &mut ZipWriter<W>,
        record: &mut ChangeRecord,
    ) -> Result<()> {
        let ctx = TransformContext::new(self.registry, &self.options, self.depth);
        let mut buffer = vec![0u8; self.options.copy_buffer_size.max(MIN_COPY_BUFFER_SIZE)];
        let mut previous: Option<String> = None;

        loop {
            let entry = match reader.next_entry() {
                Ok(Some(entry)) => entry,
                Ok(None) => return Ok(()),
                Err(e) => {
                    let position = match previous {
                        Some(name) => ContainerPosition::After(name),
                        None => ContainerPosition::FirstEntry,
                    };
                    return Err(Error::container(archive, position, e));
                }
            };

            let (label, result) = match sanitize(&entry.name) {
                Ok(name) => {
                    debug!("[{}] '{}' size {:?}", archive, name, entry.size);
                    let mut dispatch = Dispatch {
                        ctx: &ctx,
                        reader: &mut *reader,
                        writer: &mut *writer,
                        buffer: &mut buffer,
                        record: &mut *record,
                    };
                    let result = dispatch.run(&entry, &name);
                    (name.into_string(), result)
                }
                Err(e) => (entry.name.clone(), Err(e)),
            };

            match result {
                Ok(outcome) => debug!("[{}] '{}' {}", archive, label, outcome),
                Err(error) => {
                    if let Err(abort_error) = writer.abort_entry() {
                        debug!("abort of '{}' failed: {}", label, abort_error);
                    }
                    if reader.is_failed() || writer.is_failed() {
                        return Err(Error::container(
                            archive,
                            ContainerPosition::Processing(label),
                            error,
                        ));
                    }
                    error!("[{}] dropping '{}': {}", archive, label, error);
                    record.record(label.clone(), None, TransformOutcome::Failed);
                }
            }
            previous = Some(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionSet, BufferedAction};
    use crate::entry::ZipEntry;

    fn archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Vec::new());
        for (name, data) in entries {
            writer.start_entry(&ZipEntry::new(*name)).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_empty_registry_copies_everything() {
        let input = archive(&[("a.txt", b"a"), ("dir/b.txt", b"b")]);
        let registry = ActionSet::new();
        let mut output = Vec::new();
        let record = Transformer::new(&registry)
            .process("in.zip", &input[..], &mut output)
            .unwrap();
        assert_eq!(record.unaccepted(), 2);
        assert_eq!(record.total(), 2);
        assert!(!record.has_failures());
    }

    #[test]
    fn test_first_entry_failure_position() {
        let registry = ActionSet::new();
        let mut output = Vec::new();
        let err = Transformer::new(&registry)
            .process("bad.zip", &b"PK\x03\x04\x14\x00"[..], &mut output)
            .unwrap_err();
        match err {
            Error::Container { input, position, .. } => {
                assert_eq!(input, "bad.zip");
                assert_eq!(position, ContainerPosition::FirstEntry);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nested_transformer_is_one_level_deeper() {
        let registry = ActionSet::new().with(BufferedAction::identity("all"));
        let options = TransformOptions::default();
        let ctx = TransformContext::new(&registry, &options, 2);
        assert_eq!(Transformer::nested(&ctx).depth(), 3);
    }
}
