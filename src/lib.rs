//! # rezip
//!
//! A pure-Rust engine for rewriting zip-family containers (zip, jar, war,
//! ear) entry by entry.
//!
//! Every entry of an input archive is routed through a registry of
//! [`Action`]s. Entries nobody claims are copied verbatim; claimed entries
//! are transformed either as streams or as whole buffers, and may be renamed
//! on the way. Archives nested inside archives are rewritten recursively
//! without ever being buffered in full. Entry names are sanitized before use,
//! so a hostile archive cannot smuggle `../` paths into the output.
//!
//! ## Quick Start
//!
//! ### Transforming an Archive
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufWriter;
//! use rezip::{ActionSet, ArchiveAction, BufferedAction, Result, Transformer};
//!
//! fn main() -> Result<()> {
//!     let registry = ActionSet::new()
//!         .with(ArchiveAction::new())
//!         .with(
//!             BufferedAction::new("shade", |_name, bytes| Ok(bytes.to_vec()))
//!                 .with_extensions(["class"])
//!                 .rename_prefix("com/acme/", "shaded/com/acme/"),
//!         );
//!
//!     let input = File::open("app.jar")?;
//!     let output = BufWriter::new(File::create("app-shaded.jar")?);
//!     let record = Transformer::new(&registry).process("app.jar", input, output)?;
//!     println!("{}", record);
//!     for (from, to) in record.renames() {
//!         println!("{} -> {}", from, to);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Reading and Writing Entries Directly
//!
//! ```rust
//! use std::io::{Read, Write};
//! use rezip::{Result, ZipEntry, ZipReader, ZipWriter};
//!
//! fn main() -> Result<()> {
//!     let mut writer = ZipWriter::new(Vec::new());
//!     writer.start_entry(&ZipEntry::new("hello.txt"))?;
//!     writer.write_all(b"Hello, World!")?;
//!     let bytes = writer.finish()?;
//!
//!     let mut reader = ZipReader::new(&bytes[..]);
//!     while let Some(entry) = reader.next_entry()? {
//!         let mut content = String::new();
//!         reader.read_to_string(&mut content)?;
//!         println!("{}: {}", entry.name, content);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `parallel` | Yes | Transform independent archives concurrently with Rayon |
//! | `regex` | No | Regex-based entry selection |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], which is an alias for
//! `std::result::Result<T, Error>`. A failed entry never fails the archive:
//! it is logged, left out of the output and reported in the
//! [`ChangeRecord`]. Only failures of the container streams themselves end
//! the archive, as [`Error::Container`]:
//!
//! ```rust,no_run
//! use rezip::{ActionSet, Error, Transformer};
//!
//! fn rewrite(input: &[u8]) -> rezip::Result<Vec<u8>> {
//!     let registry = ActionSet::new();
//!     let mut output = Vec::new();
//!     match Transformer::new(&registry).process("input.zip", input, &mut output) {
//!         Ok(record) if record.has_failures() => {
//!             eprintln!("some entries were dropped: {}", record);
//!             Ok(output)
//!         }
//!         Ok(_) => Ok(output),
//!         Err(Error::Container { input, position, source }) => {
//!             eprintln!("{} is unusable ({}): {}", input, position, source);
//!             Err(*source)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://docs.rs/log) facade: per-entry
//! routing at `debug`, copied-unchanged nested archives at `warn`, dropped
//! entries and buffered fallbacks at `error`. Install any logger to see them.
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod action;
pub mod checksum;
pub mod entry;
pub mod entry_name;
pub mod error;
pub mod format;
pub mod options;
pub mod read;
pub mod transform;
pub mod write;

pub use error::{ContainerPosition, Error, Result};

// Re-export the container API at crate root for convenience
pub use entry::{CompressionMethod, DosDateTime, ZipEntry};
pub use read::ZipReader;
pub use write::ZipWriter;

// Re-export the action API
pub use action::{
    Action, ActionRegistry, ActionSet, ArchiveAction, BufferedAction, ByteData, SelectionRule,
    TransformContext,
};

// Re-export the engine API
pub use entry_name::{SanitizedName, sanitize};
pub use options::TransformOptions;
pub use transform::{ChangeRecord, EntryRecord, TransformOutcome, Transformer};

#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
pub use transform::BatchJob;
