//! Per-entry transformation actions.
//!
//! An [`Action`] owns one kind of content. The engine asks the
//! [`ActionRegistry`] for the action that accepts an entry name, checks the
//! action's selection policy, and then hands the entry bytes to it either
//! as a stream ([`Action::transform_stream`]) or as a whole buffer
//! ([`Action::transform_buffer`]).
//!
//! Streaming suits content that can be arbitrarily large and is processed
//! front to back, most importantly nested archives ([`ArchiveAction`]).
//! Buffered transforms see the whole entry and may decide the output name
//! from its content.
//!
//! # Example
//!
//! ```rust
//! use rezip::{ActionSet, BufferedAction};
//!
//! let upper = BufferedAction::new("upper", |_name, bytes| Ok(bytes.to_ascii_uppercase()))
//!     .with_extensions(["txt"]);
//! let registry = ActionSet::new().with(upper);
//! ```

pub mod archive;
pub mod buffered;
pub mod selection;

pub use archive::ArchiveAction;
pub use buffered::BufferedAction;
pub use selection::SelectionRule;

use std::fmt;
use std::io::{Read, Write};

use crate::options::TransformOptions;
use crate::transform::ChangeRecord;
use crate::{Error, Result};

/// Named, owned bytes produced by a buffered transform.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteData {
    /// Output entry name, before sanitization.
    pub name: String,
    /// Output bytes.
    pub data: Vec<u8>,
}

impl fmt::Debug for ByteData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteData")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

impl ByteData {
    /// Creates named bytes.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// What a streaming action needs to re-enter the engine.
///
/// Nested archives are transformed with the same registry and options as
/// their parent, one level deeper.
#[derive(Clone, Copy)]
pub struct TransformContext<'a> {
    registry: &'a dyn ActionRegistry,
    options: &'a TransformOptions,
    depth: usize,
}

impl fmt::Debug for TransformContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("depth", &self.depth)
            .field("options", self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> TransformContext<'a> {
    /// Creates a context for an archive at `depth` (0 for top-level input).
    pub fn new(
        registry: &'a dyn ActionRegistry,
        options: &'a TransformOptions,
        depth: usize,
    ) -> Self {
        Self {
            registry,
            options,
            depth,
        }
    }

    /// The registry in effect.
    pub fn registry(&self) -> &'a dyn ActionRegistry {
        self.registry
    }

    /// The options in effect.
    pub fn options(&self) -> &'a TransformOptions {
        self.options
    }

    /// Nesting depth of the archive whose entry is being transformed.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if an archive nested in the current one may still be
    /// transformed.
    pub fn can_descend(&self) -> bool {
        self.depth < self.options.max_nesting_depth
    }
}

/// Handler for one kind of entry content.
///
/// Implementations must be shareable across threads: one registry may
/// serve several archives processed in parallel.
pub trait Action: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Returns true if this action handles entries named `name`.
    fn accepts(&self, name: &str) -> bool;

    /// Returns true if an accepted entry should actually be transformed.
    ///
    /// Unselected entries are copied verbatim.
    fn selects(&self, name: &str) -> bool {
        let _ = name;
        true
    }

    /// Returns true if entries are transformed as streams.
    fn uses_streams(&self) -> bool {
        false
    }

    /// Returns the output name for `name`.
    fn relocate(&self, name: &str) -> String {
        name.to_string()
    }

    /// Transforms an entry stream.
    ///
    /// `declared_len` is the uncompressed size the container declares, if
    /// any; it is untrusted. Actions that re-enter the engine return the
    /// record of the nested archive.
    fn transform_stream(
        &self,
        ctx: &TransformContext<'_>,
        name: &str,
        input: &mut dyn Read,
        declared_len: Option<u64>,
        output: &mut dyn Write,
    ) -> Result<Option<ChangeRecord>> {
        let _ = (ctx, input, declared_len, output);
        Err(Error::transform(
            name,
            format!("action '{}' does not transform streams", self.name()),
        ))
    }

    /// Transforms a whole entry.
    ///
    /// Failing with [`Error::Transform`] makes the engine keep the original
    /// bytes instead.
    fn transform_buffer(&self, name: &str, data: &[u8]) -> Result<ByteData> {
        let _ = data;
        Err(Error::transform(
            name,
            format!("action '{}' does not transform buffers", self.name()),
        ))
    }
}

/// Finds the action responsible for an entry name.
pub trait ActionRegistry: Send + Sync {
    /// Returns the action that accepts `name`, if any.
    fn action_for(&self, name: &str) -> Option<&dyn Action>;
}

/// Ordered list of actions; the first one that accepts a name wins.
#[derive(Default)]
pub struct ActionSet {
    actions: Vec<Box<dyn Action>>,
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.actions.iter().map(|a| a.name()))
            .finish()
    }
}

impl ActionSet {
    /// Creates an empty set; it accepts nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action.
    pub fn with(mut self, action: impl Action + 'static) -> Self {
        self.push(Box::new(action));
        self
    }

    /// Appends a boxed action.
    pub fn push(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the set has no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl ActionRegistry for ActionSet {
    fn action_for(&self, name: &str) -> Option<&dyn Action> {
        self.actions
            .iter()
            .find(|action| action.accepts(name))
            .map(|action| action.as_ref())
    }
}

/// Case-insensitive extension check on the last segment of `name`.
pub(crate) fn has_extension(name: &str, extensions: &[String]) -> bool {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    match file_name.rfind('.') {
        Some(pos) if pos > 0 => {
            let extension = &file_name[pos + 1..];
            extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(extension))
        }
        _ => false,
    }
}
