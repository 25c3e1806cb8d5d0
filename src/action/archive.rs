//! Nested archive action.

use std::io::{self, Read, Write};

use log::{debug, warn};

use super::{Action, SelectionRule, TransformContext, has_extension};
use crate::format::is_zip_magic;
use crate::transform::{ChangeRecord, Transformer};
use crate::{Error, Result};

/// Extensions of zip-family containers handled by default.
pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["zip", "jar", "war", "ear", "rar"];

/// Streams nested containers through the engine again.
///
/// A nested archive is never buffered: its entries are read from the parent
/// entry stream and the rewritten archive is written straight into the
/// parent output entry. Beyond the configured nesting depth, nested archives
/// are copied unchanged, and so are entries that only carry an archive
/// extension but do not start with a zip signature.
#[derive(Debug, Clone)]
pub struct ArchiveAction {
    extensions: Vec<String>,
    selection: SelectionRule,
}

impl Default for ArchiveAction {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_ARCHIVE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            selection: SelectionRule::new(),
        }
    }
}

impl ArchiveAction {
    /// Creates an action for the default container extensions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the accepted extensions (compared case-insensitively).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts which accepted archives are descended into.
    pub fn with_selection(mut self, selection: SelectionRule) -> Self {
        self.selection = selection;
        self
    }
}

impl Action for ArchiveAction {
    fn name(&self) -> &str {
        "archive"
    }

    fn accepts(&self, name: &str) -> bool {
        has_extension(name, &self.extensions)
    }

    fn selects(&self, name: &str) -> bool {
        self.selection.selects(name)
    }

    fn uses_streams(&self) -> bool {
        true
    }

    fn transform_stream(
        &self,
        ctx: &TransformContext<'_>,
        name: &str,
        input: &mut dyn Read,
        declared_len: Option<u64>,
        output: &mut dyn Write,
    ) -> Result<Option<ChangeRecord>> {
        if !ctx.can_descend() {
            warn!(
                "nested archive '{}' is deeper than {} levels, copying it unchanged",
                name,
                ctx.options().max_nesting_depth
            );
            io::copy(input, output).map_err(Error::from_io)?;
            return Ok(None);
        }

        let mut head = [0u8; 4];
        let filled = read_head(input, &mut head)?;
        let mut input = (&head[..filled]).chain(input);
        if !is_zip_magic(&head[..filled]) {
            warn!("'{}' is not a zip container, copying it unchanged", name);
            io::copy(&mut input, output).map_err(Error::from_io)?;
            return Ok(None);
        }

        debug!(
            "descending into '{}' ({:?} bytes) at depth {}",
            name,
            declared_len,
            ctx.depth() + 1
        );
        let record = Transformer::nested(ctx).process(name, input, output)?;
        Ok(Some(record))
    }
}

/// Reads until `buf` is full or the input ends.
fn read_head(input: &mut dyn Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::from_io(e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_container_extensions() {
        let action = ArchiveAction::new();
        for name in ["a.zip", "lib/b.jar", "WEB.WAR", "x/y/z.ear", "old.rar"] {
            assert!(action.accepts(name), "{name}");
        }
        for name in ["a.txt", "zip", "lib/", "a.jar/"] {
            assert!(!action.accepts(name), "{name}");
        }
        assert!(action.uses_streams());
    }

    #[test]
    fn test_custom_extensions_and_selection() {
        let action = ArchiveAction::new()
            .with_extensions(["kar"])
            .with_selection(SelectionRule::new().exclude("vendor/*").unwrap());
        assert!(action.accepts("a.kar"));
        assert!(!action.accepts("a.jar"));
        assert!(action.selects("lib/a.kar"));
        assert!(!action.selects("vendor/a.kar"));
    }

    #[test]
    fn test_read_head_stops_at_end_of_input() {
        let mut input: &[u8] = b"PK";
        let mut head = [0u8; 4];
        assert_eq!(read_head(&mut input, &mut head).unwrap(), 2);
        assert_eq!(&head[..2], b"PK");
    }
}
