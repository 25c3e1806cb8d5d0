//! Error types for zip transformation.
//!
//! This module provides the [`Error`] enum which represents all failure
//! modes of reading, rewriting and writing zip-family containers, along with
//! a convenient [`Result<T>`] type alias.
//!
//! # Entry-scoped vs. archive-scoped failures
//!
//! Most variants describe a problem with a single entry: an untrusted name
//! that cannot be sanitized ([`Error::InvalidEntryName`]), an action that
//! failed on accepted content ([`Error::Transform`]), a duplicate output name.
//! The transformer downgrades those to a recorded outcome and keeps going.
//!
//! Failures of the container streams themselves surface to the caller as
//! [`Error::Container`], which names the archive and where in it processing
//! stopped:
//!
//! ```rust
//! use rezip::{Error, error::ContainerPosition};
//!
//! fn describe(error: &Error) {
//!     match error {
//!         Error::Container { input, position, .. } => {
//!             eprintln!("{} is unusable ({})", input, position);
//!         }
//!         Error::InvalidEntryName { name, .. } => {
//!             eprintln!("Security: refusing entry name {:?}", name);
//!         }
//!         other => eprintln!("Error: {}", other),
//!     }
//! }
//! # let _ = ContainerPosition::FirstEntry;
//! ```

use std::fmt;
use std::io;

/// Where in an archive a fatal container failure happened.
///
/// Large archives are expensive to re-scan, so the position is reported
/// relative to the entries that were being handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerPosition {
    /// An entry was actively being processed.
    Processing(String),
    /// The failure happened while moving past a completed entry.
    After(String),
    /// No entry had completed yet.
    FirstEntry,
    /// Entries were done; the output trailer could not be completed.
    Trailer,
}

impl fmt::Display for ContainerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing(name) => write!(f, "while processing '{}'", name),
            Self::After(name) => write!(f, "after processing '{}'", name),
            Self::FirstEntry => write!(f, "at the first entry"),
            Self::Trailer => write!(f, "while completing output"),
        }
    }
}

/// Helper struct for formatting CrcMismatch error messages.
struct CrcMismatchDisplay<'a> {
    entry_name: &'a str,
    expected: u32,
    actual: u32,
}

impl fmt::Display for CrcMismatchDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CRC mismatch for entry '{}': expected {:#010x}, got {:#010x}",
            self.entry_name, self.expected, self.actual
        )
    }
}

/// Boxed source error carried by [`Error::Transform`].
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for zip transformation.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | Underlying stream failures |
/// | Format | [`InvalidFormat`][Self::InvalidFormat], [`CorruptHeader`][Self::CorruptHeader] | Malformed container |
/// | Compatibility | [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedFeature`][Self::UnsupportedFeature] | Zip64, exotic layouts |
/// | Integrity | [`CrcMismatch`][Self::CrcMismatch], [`SizeMismatch`][Self::SizeMismatch] | Data corruption |
/// | Security | [`InvalidEntryName`][Self::InvalidEntryName] | Zip-slip attempts |
/// | Writing | [`DuplicateEntry`][Self::DuplicateEntry], [`MissingEntryMetadata`][Self::MissingEntryMetadata] | Output contract violations |
/// | Transformation | [`Transform`][Self::Transform], [`Container`][Self::Container] | Actions and whole archives |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on an underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a zip container, or a record has the wrong shape.
    #[error("Invalid zip format: {0}")]
    InvalidFormat(String),

    /// A container record is corrupt or truncated.
    ///
    /// The offset is relative to the start of the stream the reader consumed.
    #[error("Corrupt header at offset {offset:#x}: {reason}")]
    CorruptHeader {
        /// The byte offset where corruption was detected.
        offset: u64,
        /// A description of the corruption.
        reason: String,
    },

    /// An entry uses a compression method the writer cannot produce.
    #[error("Unsupported compression method {method} for entry '{entry_name}'")]
    UnsupportedMethod {
        /// Name of the entry.
        entry_name: String,
        /// Raw method id from the entry header.
        method: u16,
    },

    /// The container uses a feature this crate does not implement.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// Decoded data does not match the CRC-32 recorded for it.
    #[error("{}", CrcMismatchDisplay { entry_name, expected: *expected, actual: *actual })]
    CrcMismatch {
        /// Name of the entry.
        entry_name: String,
        /// CRC recorded in the container.
        expected: u32,
        /// CRC of the bytes actually seen.
        actual: u32,
    },

    /// An entry holds a different number of bytes than declared.
    #[error("Size mismatch for entry '{entry_name}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Name of the entry.
        entry_name: String,
        /// Declared size.
        expected: u64,
        /// Observed size.
        actual: u64,
    },

    /// An untrusted entry name failed sanitization.
    ///
    /// This is a **security error**: the name is either not normalizable or
    /// resolves outside the archive root (e.g. `../../etc/passwd`). The entry
    /// is never written under a "fixed up" name.
    #[error("Invalid entry name '{name}': {reason}")]
    InvalidEntryName {
        /// The offending name as read or produced.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The output already holds an entry with this name.
    #[error("Duplicate entry '{name}'")]
    DuplicateEntry {
        /// The duplicated name.
        name: String,
    },

    /// Metadata the writer needs for this entry is missing.
    #[error("Entry '{entry_name}' is missing required metadata: {field}")]
    MissingEntryMetadata {
        /// Name of the entry.
        entry_name: String,
        /// The missing field.
        field: &'static str,
    },

    /// Entry data was written while no entry was open.
    #[error("No entry is open for writing")]
    NoOpenEntry,

    /// A container stream is unusable after an earlier failure.
    ///
    /// Once the reader or the writer has seen an I/O error or corrupt data,
    /// its position in the container is unknown and every later call fails
    /// with this error.
    #[error("The {stream} stopped after an earlier failure")]
    Poisoned {
        /// Which side failed: `"reader"` or `"writer"`.
        stream: &'static str,
    },

    /// An action failed to transform accepted, selected content.
    ///
    /// Buffered transforms that fail this way fall back to the original
    /// bytes; streaming transforms that fail this way drop the entry.
    #[error("Transform of '{name}' failed: {message}")]
    Transform {
        /// Name of the entry being transformed.
        name: String,
        /// A description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxedSource>,
    },

    /// An archive could not be transformed as a whole.
    ///
    /// Raised only for failures of the container streams (reading, writing,
    /// or a corrupt container), never for individual bad entries.
    #[error("Failed to transform '{input}' {position}: {source}")]
    Container {
        /// Name of the archive being processed.
        input: String,
        /// Where processing stopped.
        position: ContainerPosition,
        /// The first unrecoverable failure.
        #[source]
        source: Box<Error>,
    },

    /// A selection pattern could not be compiled.
    #[error("Invalid selection pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern text.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// The compression level is outside 0-9.
    #[error("Invalid compression level {level}: must be between 0 and 9")]
    InvalidCompressionLevel {
        /// The rejected level.
        level: u32,
    },
}

impl Error {
    /// Creates an [`Error::Transform`] without an underlying cause.
    pub fn transform(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an [`Error::Transform`] wrapping an underlying cause.
    pub fn transform_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Transform {
            name: name.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an [`Error::InvalidEntryName`].
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEntryName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps `source` as an archive-level failure of `input`.
    pub fn container(input: impl Into<String>, position: ContainerPosition, source: Error) -> Self {
        Self::Container {
            input: input.into(),
            position,
            source: Box::new(source),
        }
    }

    /// Returns true for failures raised by an action on accepted content.
    pub fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }

    /// Returns true for whole-archive failures.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container { .. })
    }

    /// Returns true if the error indicates corrupt container data.
    pub fn is_corruption(&self) -> bool {
        match self {
            Self::CrcMismatch { .. }
            | Self::SizeMismatch { .. }
            | Self::CorruptHeader { .. }
            | Self::InvalidFormat(_) => true,
            Self::Container { source, .. } => source.is_corruption(),
            _ => false,
        }
    }

    /// Converts into an [`io::Error`] so it can travel through `Read`/`Write`.
    ///
    /// I/O errors are unwrapped; everything else becomes `InvalidData`.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }

    /// Recovers an error that crossed a `Read`/`Write` boundary.
    ///
    /// Inverse of [`Error::into_io`]: a crate error wrapped in an
    /// [`io::Error`] is unwrapped, anything else becomes [`Error::Io`].
    pub fn from_io(error: io::Error) -> Self {
        if error.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            let kind = error.kind();
            return match error.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                _ => Self::Io(io::Error::from(kind)),
            };
        }
        Self::Io(error)
    }
}

/// A specialized `Result` type for zip transformation.
pub type Result<T> = std::result::Result<T, Error>;
