//! Lint and breaking-change checks over compiled images.
//!
//! A [`CheckEngine`] holds [`LintRule`]s and [`BreakingRule`]s, selects the
//! ones a [`strata_config::CheckConfig`] asks for, runs them over the target
//! files of an [`Image`], and returns the findings as sorted
//! [`FileAnnotation`](strata_diagnostics::FileAnnotation)s whose type is the
//! rule ID. [`Plugin`] describes an external check unit and its digest.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod plugin;
pub mod rules;

#[cfg(test)]
mod testing;

pub use engine::CheckEngine;
pub use error::CheckError;
pub use plugin::{Plugin, PluginDataFn};

use strata_image::{Image, ImageFile, SourceLocation};

/// Names of the categories rules may belong to.
pub const CATEGORIES: &[&str] = &["MINIMAL", "DEFAULT", "STANDARD", "FILE"];

/// What every rule reports about itself.
pub trait Rule: Send + Sync {
    /// The rule ID, such as `IMPORT_USED`.
    fn id(&self) -> &str;

    /// The categories that enable this rule.
    fn categories(&self) -> &[&'static str];

    /// A one-line statement of what the rule checks.
    fn purpose(&self) -> &str;
}

/// A rule over a single file of the image being checked.
pub trait LintRule: Rule {
    /// Reports findings for `file`, a target file of `image`.
    fn check_file(&self, file: &ImageFile, image: &Image, findings: &mut Vec<Finding>);
}

/// A rule comparing an image against a previous one.
pub trait BreakingRule: Rule {
    /// Reports changes from `against` to `image` that break compatibility.
    fn check(&self, image: &Image, against: &Image, findings: &mut Vec<Finding>);
}

/// A finding from one rule, before it becomes an annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finding {
    /// The path of the file the finding is about.
    pub path: String,
    /// The user-facing path of that file.
    pub external_path: String,
    /// The declaration the finding points at, if known.
    pub location: Option<SourceLocation>,
    /// The message.
    pub message: String,
}

impl Finding {
    /// A finding about `file` as a whole.
    pub fn file(file: &ImageFile, message: impl Into<String>) -> Self {
        Self {
            path: file.path().to_string(),
            external_path: file.external_path().to_string(),
            location: None,
            message: message.into(),
        }
    }

    /// A finding at the declaration of `symbol` in `file`.
    ///
    /// The position is left unknown when the file was compiled without
    /// source code info.
    pub fn symbol(file: &ImageFile, symbol: &str, message: impl Into<String>) -> Self {
        Self {
            location: file.descriptor().location(symbol).cloned(),
            ..Self::file(file, message)
        }
    }
}
