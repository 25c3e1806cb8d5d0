//! Include/exclude selection of entry names.
//!
//! Selection is a policy layer on top of acceptance: an action accepts names
//! by content type, and a [`SelectionRule`] then narrows (or widens back) the
//! accepted set by pattern.

use glob::{MatchOptions, Pattern};

use crate::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Include and exclude patterns over sanitized entry names.
///
/// A name is selected if it matches at least one include pattern (or there
/// are none) and matches no exclude pattern.
///
/// # Example
///
/// ```rust
/// use rezip::SelectionRule;
///
/// let rule = SelectionRule::new()
///     .include("com/acme/**/*.class")?
///     .exclude("**/*Test.class")?;
/// assert!(rule.selects("com/acme/app/Main.class"));
/// assert!(!rule.selects("com/acme/app/MainTest.class"));
/// assert!(!rule.selects("org/other/Lib.class"));
/// # Ok::<(), rezip::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectionRule {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    #[cfg(feature = "regex")]
    include_regex: Vec<regex::Regex>,
    #[cfg(feature = "regex")]
    exclude_regex: Vec<regex::Regex>,
}

impl SelectionRule {
    /// Creates a rule that selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule from pattern lists.
    pub fn from_patterns<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut rule = Self::new();
        for pattern in include {
            rule = rule.include(pattern.as_ref())?;
        }
        for pattern in exclude {
            rule = rule.exclude(pattern.as_ref())?;
        }
        Ok(rule)
    }

    /// Adds an include glob.
    pub fn include(mut self, pattern: &str) -> Result<Self> {
        self.include.push(compile(pattern)?);
        Ok(self)
    }

    /// Adds an exclude glob.
    pub fn exclude(mut self, pattern: &str) -> Result<Self> {
        self.exclude.push(compile(pattern)?);
        Ok(self)
    }

    /// Adds an include regular expression.
    #[cfg(feature = "regex")]
    pub fn include_regex(mut self, pattern: &str) -> Result<Self> {
        self.include_regex.push(compile_regex(pattern)?);
        Ok(self)
    }

    /// Adds an exclude regular expression.
    #[cfg(feature = "regex")]
    pub fn exclude_regex(mut self, pattern: &str) -> Result<Self> {
        self.exclude_regex.push(compile_regex(pattern)?);
        Ok(self)
    }

    /// Returns true if the rule has no patterns at all.
    pub fn is_unrestricted(&self) -> bool {
        self.include_count() == 0 && self.exclude_count() == 0
    }

    /// Checks `name` against the rule.
    pub fn selects(&self, name: &str) -> bool {
        if self.include_count() > 0 && !self.any_include(name) {
            return false;
        }
        !self.any_exclude(name)
    }

    fn include_count(&self) -> usize {
        let count = self.include.len();
        #[cfg(feature = "regex")]
        let count = count + self.include_regex.len();
        count
    }

    fn exclude_count(&self) -> usize {
        let count = self.exclude.len();
        #[cfg(feature = "regex")]
        let count = count + self.exclude_regex.len();
        count
    }

    fn any_include(&self, name: &str) -> bool {
        let glob = self.include.iter().any(|p| p.matches_with(name, MATCH_OPTIONS));
        #[cfg(feature = "regex")]
        let glob = glob || self.include_regex.iter().any(|r| r.is_match(name));
        glob
    }

    fn any_exclude(&self, name: &str) -> bool {
        let glob = self.exclude.iter().any(|p| p.matches_with(name, MATCH_OPTIONS));
        #[cfg(feature = "regex")]
        let glob = glob || self.exclude_regex.iter().any(|r| r.is_match(name));
        glob
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(feature = "regex")]
fn compile_regex(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
