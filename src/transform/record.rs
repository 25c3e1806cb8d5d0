//! Per-archive change bookkeeping.

use std::fmt;

/// What happened to one input entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransformOutcome {
    /// No action accepted the entry; copied verbatim.
    CopiedUnaccepted,
    /// An action accepted the entry but did not select it; copied verbatim.
    CopiedUnselected,
    /// Transformed as a stream.
    TransformedStreaming,
    /// Transformed as a whole buffer.
    TransformedBuffered,
    /// The buffered transform failed; the original bytes were written.
    TransformedWithFallback,
    /// The entry could not be processed and is missing from the output.
    ///
    /// "Missing" means absent from the central directory. When a streaming
    /// transform failed after writing, the partial entry stays in the file
    /// as an unreferenced local record: [`ZipReader::with_index`] skips it,
    /// but a purely sequential [`ZipReader::new`] (which nested archives are
    /// read with) still yields it with the truncated bytes.
    ///
    /// [`ZipReader::with_index`]: crate::ZipReader::with_index
    /// [`ZipReader::new`]: crate::ZipReader::new
    Failed,
}

impl TransformOutcome {
    /// All outcomes in declaration order.
    pub const ALL: [TransformOutcome; 6] = [
        Self::CopiedUnaccepted,
        Self::CopiedUnselected,
        Self::TransformedStreaming,
        Self::TransformedBuffered,
        Self::TransformedWithFallback,
        Self::Failed,
    ];

    /// Returns true for the three transformed outcomes.
    pub fn is_transformed(self) -> bool {
        matches!(
            self,
            Self::TransformedStreaming | Self::TransformedBuffered | Self::TransformedWithFallback
        )
    }

    /// Returns true for verbatim copies.
    pub fn is_copied(self) -> bool {
        matches!(self, Self::CopiedUnaccepted | Self::CopiedUnselected)
    }

    /// Returns true if the entry has an output entry.
    pub fn has_output(self) -> bool {
        self != Self::Failed
    }

    fn slot(self) -> usize {
        self as usize
    }

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::CopiedUnaccepted => "unaccepted",
            Self::CopiedUnselected => "unselected",
            Self::TransformedStreaming => "streamed",
            Self::TransformedBuffered => "buffered",
            Self::TransformedWithFallback => "fallback",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransformOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One input entry and where it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Sanitized input name, or the raw name if sanitization failed.
    pub input: String,
    /// Sanitized output name; `None` when the entry was dropped.
    pub output: Option<String>,
    /// What happened.
    pub outcome: TransformOutcome,
}

/// Summary of one archive's transformation.
///
/// Entries are kept in input order. Records of nested archives hang off the
/// parent record under the output name of the nested archive entry.
///
/// Accepted entries are the transformed and the unselected ones; selected
/// entries are the transformed ones. Failed entries count toward neither.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecord {
    name: String,
    counts: [usize; 6],
    entries: Vec<EntryRecord>,
    nested: Vec<(String, ChangeRecord)>,
}

impl ChangeRecord {
    /// Creates an empty record for archive `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name of the archive.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records the outcome of one entry.
    pub fn record(
        &mut self,
        input: impl Into<String>,
        output: Option<String>,
        outcome: TransformOutcome,
    ) {
        self.counts[outcome.slot()] += 1;
        self.entries.push(EntryRecord {
            input: input.into(),
            output,
            outcome,
        });
    }

    /// Attaches the record of a nested archive written as `output`.
    pub fn attach_nested(&mut self, output: impl Into<String>, record: ChangeRecord) {
        self.nested.push((output.into(), record));
    }

    /// Number of entries with `outcome`.
    pub fn count(&self, outcome: TransformOutcome) -> usize {
        self.counts[outcome.slot()]
    }

    /// Number of entries seen.
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Entries an action accepted.
    pub fn accepted(&self) -> usize {
        self.unselected() + self.transformed()
    }

    /// Entries no action accepted.
    pub fn unaccepted(&self) -> usize {
        self.count(TransformOutcome::CopiedUnaccepted)
    }

    /// Accepted entries that were selected.
    pub fn selected(&self) -> usize {
        self.transformed()
    }

    /// Accepted entries that were not selected.
    pub fn unselected(&self) -> usize {
        self.count(TransformOutcome::CopiedUnselected)
    }

    /// Entries transformed in any mode, fallbacks included.
    pub fn transformed(&self) -> usize {
        self.count(TransformOutcome::TransformedStreaming)
            + self.count(TransformOutcome::TransformedBuffered)
            + self.count(TransformOutcome::TransformedWithFallback)
    }

    /// Entries dropped from the output.
    pub fn failed(&self) -> usize {
        self.count(TransformOutcome::Failed)
    }

    /// Returns true if this archive or any nested one dropped entries.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.nested.iter().any(|(_, r)| r.has_failures())
    }

    /// Returns true if any entry was transformed.
    pub fn has_changes(&self) -> bool {
        self.transformed() > 0
    }

    /// Entries in input order.
    pub fn entries(&self) -> &[EntryRecord] {
        &self.entries
    }

    /// Outcomes in input order.
    pub fn outcomes(&self) -> Vec<TransformOutcome> {
        self.entries.iter().map(|e| e.outcome).collect()
    }

    /// Returns the first entry recorded for input `name`.
    pub fn entry(&self, input: &str) -> Option<&EntryRecord> {
        self.entries.iter().find(|e| e.input == input)
    }

    /// Returns the output name of input `name`.
    pub fn output_name_of(&self, input: &str) -> Option<&str> {
        self.entry(input).and_then(|e| e.output.as_deref())
    }

    /// Transformed entries whose output name differs from the input name.
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|e| match &e.output {
            Some(output) if e.outcome.is_transformed() && *output != e.input => {
                Some((e.input.as_str(), output.as_str()))
            }
            _ => None,
        })
    }

    /// Nested archive records keyed by their output entry name.
    pub fn nested(&self) -> &[(String, ChangeRecord)] {
        &self.nested
    }

    /// Returns the record of the nested archive written as `output`.
    pub fn nested_record(&self, output: &str) -> Option<&ChangeRecord> {
        self.nested
            .iter()
            .find(|(name, _)| name == output)
            .map(|(_, record)| record)
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} entries", self.name, self.total())?;
        for outcome in TransformOutcome::ALL {
            let count = self.count(outcome);
            if count > 0 {
                write!(f, ", {} {}", count, outcome)?;
            }
        }
        if !self.nested.is_empty() {
            write!(f, ", {} nested", self.nested.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransformOutcome::*;

    fn sample() -> ChangeRecord {
        let mut record = ChangeRecord::new("app.jar");
        record.record("lib/Foo.class", Some("lib2/Foo.class".into()), TransformedBuffered);
        record.record("README.txt", Some("README.txt".into()), CopiedUnaccepted);
        record.record("a.properties", Some("a.properties".into()), CopiedUnselected);
        record.record("b.properties", Some("b.properties".into()), TransformedWithFallback);
        record.record("../evil", None, Failed);
        record
    }

    #[test]
    fn test_counts() {
        let record = sample();
        assert_eq!(record.total(), 5);
        assert_eq!(record.accepted(), 3);
        assert_eq!(record.unaccepted(), 1);
        assert_eq!(record.selected(), 2);
        assert_eq!(record.unselected(), 1);
        assert_eq!(record.transformed(), 2);
        assert_eq!(record.failed(), 1);
        assert!(record.has_failures());
    }

    #[test]
    fn test_renames_only_for_transformed() {
        let record = sample();
        let renames: Vec<_> = record.renames().collect();
        assert_eq!(renames, vec![("lib/Foo.class", "lib2/Foo.class")]);
        assert_eq!(record.output_name_of("lib/Foo.class"), Some("lib2/Foo.class"));
        assert_eq!(record.output_name_of("../evil"), None);
    }

    #[test]
    fn test_nested_failures_propagate() {
        let mut inner = ChangeRecord::new("inner.jar");
        inner.record("x", None, Failed);
        let mut outer = ChangeRecord::new("outer.zip");
        outer.record("inner.jar", Some("inner.jar".into()), TransformedStreaming);
        assert!(!outer.has_failures());
        outer.attach_nested("inner.jar", inner);
        assert!(outer.has_failures());
        assert_eq!(outer.nested_record("inner.jar").unwrap().name(), "inner.jar");
    }

    #[test]
    fn test_display_summary() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "app.jar: 5 entries, 1 unaccepted, 1 unselected, 1 buffered, 1 fallback, 1 failed"
        );
    }
}
