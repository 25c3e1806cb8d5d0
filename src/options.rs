//! Transformation options.

use crate::write::DEFAULT_COMPRESSION_LEVEL;
use crate::{Error, Result};

/// Default size of the per-archive copy buffer.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 32 * 1024;

/// Smallest accepted copy buffer size.
pub const MIN_COPY_BUFFER_SIZE: usize = 512;

/// Default nesting depth beyond which nested archives are passed through.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Default cap on capacity reserved from a declared entry size.
pub const DEFAULT_MAX_PREALLOCATION: usize = 16 * 1024 * 1024;

/// Options shared by every archive a [`Transformer`] processes, nested
/// archives included.
///
/// [`Transformer`]: crate::Transformer
///
/// # Example
///
/// ```rust
/// use rezip::TransformOptions;
///
/// let options = TransformOptions::new()
///     .compression_level(9)?
///     .max_nesting_depth(4)
///     .copy_buffer_size(64 * 1024);
/// assert_eq!(options.compression_level, 9);
/// # Ok::<(), rezip::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Size of the scratch buffer reused for verbatim copies.
    pub copy_buffer_size: usize,
    /// Deflate level (0-9) for entries the engine writes.
    pub compression_level: u32,
    /// Nested archives deeper than this are copied without transformation.
    pub max_nesting_depth: usize,
    /// Upper bound on the buffer capacity reserved up front from the
    /// (untrusted) declared size of a buffered entry. The buffer still
    /// grows to the actual entry size.
    pub max_preallocation: usize,
    /// Copy the input archive comment to the output.
    pub preserve_archive_comment: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_preallocation: DEFAULT_MAX_PREALLOCATION,
            preserve_archive_comment: true,
        }
    }
}

impl TransformOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the copy buffer size, raised to at least
    /// [`MIN_COPY_BUFFER_SIZE`].
    pub fn copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(MIN_COPY_BUFFER_SIZE);
        self
    }

    /// Sets the compression level (strict validation).
    ///
    /// Use [`compression_level_clamped`] to clamp instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCompressionLevel`] if level is greater than 9.
    ///
    /// [`compression_level_clamped`]: Self::compression_level_clamped
    pub fn compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel { level });
        }
        self.compression_level = level;
        Ok(self)
    }

    /// Sets the compression level, clamping values above 9.
    pub fn compression_level_clamped(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Sets the maximum nesting depth. Zero disables nested transformation.
    pub fn max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Sets the preallocation cap for buffered entries.
    pub fn max_preallocation(mut self, bytes: usize) -> Self {
        self.max_preallocation = bytes;
        self
    }

    /// Sets whether the archive comment is copied.
    pub fn preserve_archive_comment(mut self, preserve: bool) -> Self {
        self.preserve_archive_comment = preserve;
        self
    }
}
