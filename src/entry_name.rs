//! Entry name sanitization.
//!
//! Entry names read from an archive are untrusted. Before a name is used for
//! anything (action lookup, output entry, change records) it is lexically
//! normalized and checked so that it cannot address anything outside the
//! archive root (the "zip-slip" attack).
//!
//! Normalization splits on both `/` and `\`, resolves `.` and `..` segments
//! against an empty root without touching the filesystem, and rejoins with
//! `/`. A trailing separator on the raw name survives as a trailing `/`, so
//! directory markers keep their meaning.
//!
//! ```
//! use rezip::entry_name::sanitize;
//!
//! assert_eq!(sanitize("a/./b/../c").unwrap().as_str(), "a/c");
//! assert_eq!(sanitize("META-INF\\").unwrap().as_str(), "META-INF/");
//! assert!(sanitize("../../etc/passwd").is_err());
//! ```

use std::fmt;

use crate::{Error, Result};

/// Maximum length of a name in bytes; zip stores name lengths in 16 bits.
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// A normalized, traversal-checked entry name.
///
/// Invariants:
/// - segments are separated by `/` only, with no empty, `.` or `..` segments
/// - never begins with a `..` segment
/// - ends with `/` exactly when the raw name ended with a separator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SanitizedName(String);

impl SanitizedName {
    /// Sanitizes `raw`, see [`sanitize`].
    pub fn new(raw: &str) -> Result<Self> {
        sanitize(raw)
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the name, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns true for directory markers (names ending in `/`).
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Returns the last segment, ignoring a trailing `/`.
    pub fn file_name(&self) -> &str {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Returns the extension of the last segment, if any.
    ///
    /// A leading dot does not start an extension (`.classpath` has none).
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&file_name[pos + 1..]),
        }
    }
}

impl fmt::Display for SanitizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SanitizedName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SanitizedName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Normalizes and validates an untrusted entry name.
///
/// # Errors
///
/// Returns [`Error::InvalidEntryName`] if the name:
/// - contains a NUL character
/// - is longer than [`MAX_NAME_LENGTH`] bytes
/// - normalizes to `..` or to a path starting with `../`
///
/// The empty name is returned unchanged.
pub fn sanitize(raw: &str) -> Result<SanitizedName> {
    if raw.is_empty() {
        return Ok(SanitizedName(String::new()));
    }
    if raw.contains('\0') {
        return Err(Error::invalid_name(raw, "contains NUL character"));
    }
    if raw.len() > MAX_NAME_LENGTH {
        return Err(Error::invalid_name(
            truncate_for_display(raw),
            format!("exceeds maximum length of {} bytes", MAX_NAME_LENGTH),
        ));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    // Unresolvable parents can only accumulate at the front.
    if segments.first() == Some(&"..") {
        return Err(Error::invalid_name(raw, "path traversal outside archive root"));
    }

    let mut normalized = segments.join("/");
    if raw.ends_with(['/', '\\']) {
        normalized.push('/');
    }
    Ok(SanitizedName(normalized))
}

fn truncate_for_display(raw: &str) -> String {
    let mut end = 64.min(raw.len());
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}
