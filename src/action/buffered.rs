//! Closure-backed buffered action.

use std::fmt;

use super::{Action, ByteData, SelectionRule, has_extension};
use crate::Result;

type TransformFn = dyn Fn(&str, &[u8]) -> Result<Vec<u8>> + Send + Sync;
type RelocateFn = dyn Fn(&str) -> String + Send + Sync;

/// Buffered action assembled from closures.
///
/// Accepts files (never directory markers) by extension, or all files when
/// no extension is configured. The transform closure receives the input
/// name and the whole entry; returning [`Error::Transform`] keeps the
/// original bytes.
///
/// [`Error::Transform`]: crate::Error::Transform
///
/// # Example
///
/// ```rust
/// use rezip::{Action, BufferedAction};
///
/// let action = BufferedAction::new("classes", |_name, bytes| Ok(bytes.to_vec()))
///     .with_extensions(["class"])
///     .rename_prefix("com/acme/", "org/acme/");
/// assert!(action.accepts("com/acme/Main.class"));
/// assert_eq!(action.relocate("com/acme/Main.class"), "org/acme/Main.class");
/// ```
pub struct BufferedAction {
    name: String,
    extensions: Vec<String>,
    selection: SelectionRule,
    relocate: Option<Box<RelocateFn>>,
    transform: Box<TransformFn>,
}

impl fmt::Debug for BufferedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedAction")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl BufferedAction {
    /// Creates an action applying `transform` to every accepted entry.
    pub fn new<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str, &[u8]) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extensions: Vec::new(),
            selection: SelectionRule::new(),
            relocate: None,
            transform: Box::new(transform),
        }
    }

    /// Creates an action that returns its input unchanged.
    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, |_, data| Ok(data.to_vec()))
    }

    /// Accepts only names with one of `extensions` (case-insensitive).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the selection rule.
    pub fn with_selection(mut self, selection: SelectionRule) -> Self {
        self.selection = selection;
        self
    }

    /// Sets the function computing output names.
    pub fn with_relocation<F>(mut self, relocate: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.relocate = Some(Box::new(relocate));
        self
    }

    /// Moves names starting with `from` under `to`.
    pub fn rename_prefix(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        self.with_relocation(move |name| match name.strip_prefix(from.as_str()) {
            Some(rest) => format!("{}{}", to, rest),
            None => name.to_string(),
        })
    }
}

impl Action for BufferedAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, name: &str) -> bool {
        if name.is_empty() || name.ends_with('/') {
            return false;
        }
        self.extensions.is_empty() || has_extension(name, &self.extensions)
    }

    fn selects(&self, name: &str) -> bool {
        self.selection.selects(name)
    }

    fn relocate(&self, name: &str) -> String {
        match &self.relocate {
            Some(relocate) => relocate(name),
            None => name.to_string(),
        }
    }

    fn transform_buffer(&self, name: &str, data: &[u8]) -> Result<ByteData> {
        let bytes = (self.transform)(name, data)?;
        Ok(ByteData::new(self.relocate(name), bytes))
    }
}
