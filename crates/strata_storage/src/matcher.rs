//! Path predicates used to filter mapped buckets.

use strata_common::normalpath;

/// A predicate over normalized paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// Matches paths whose final component has this extension, dot included.
    Ext(String),
    /// Matches exactly this path.
    Equal(String),
    /// Matches paths strictly inside this directory.
    Contained(String),
    /// Matches this path or anything inside it.
    EqualOrContained(String),
    /// Matches when every inner matcher matches.
    And(Vec<Matcher>),
    /// Matches when any inner matcher matches.
    Or(Vec<Matcher>),
    /// Inverts the inner matcher.
    Not(Box<Matcher>),
}

impl Matcher {
    /// Shorthand for [`Matcher::Ext`].
    pub fn ext(ext: impl Into<String>) -> Self {
        Matcher::Ext(ext.into())
    }

    /// Shorthand for [`Matcher::Equal`].
    pub fn equal(path: impl Into<String>) -> Self {
        Matcher::Equal(path.into())
    }

    /// Shorthand for [`Matcher::Not`].
    pub fn not(inner: Matcher) -> Self {
        Matcher::Not(Box::new(inner))
    }

    /// Returns `true` if `path` satisfies this matcher.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Matcher::Ext(ext) => normalpath::ext(path) == ext,
            Matcher::Equal(expected) => path == expected,
            Matcher::Contained(dir) => normalpath::contains(dir, path),
            Matcher::EqualOrContained(dir) => normalpath::equals_or_contains(dir, path),
            Matcher::And(all) => all.iter().all(|m| m.matches(path)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(path)),
            Matcher::Not(inner) => !inner.matches(path),
        }
    }
}
