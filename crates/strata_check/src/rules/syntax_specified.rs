//! SYNTAX_SPECIFIED: every file declares its syntax.

use strata_image::{Image, ImageFile};

use crate::rules::LINT_CATEGORIES;
use crate::{Finding, LintRule, Rule};

/// Reports files without a `syntax` statement.
pub struct SyntaxSpecified;

impl Rule for SyntaxSpecified {
    fn id(&self) -> &str {
        "SYNTAX_SPECIFIED"
    }

    fn categories(&self) -> &[&'static str] {
        LINT_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that all files have a syntax specified."
    }
}

impl LintRule for SyntaxSpecified {
    fn check_file(&self, file: &ImageFile, _image: &Image, findings: &mut Vec<Finding>) {
        if file.is_syntax_unspecified() {
            findings.push(Finding::file(
                file,
                "Files must have a syntax explicitly specified. If no syntax is specified, the file defaults to \"schema1\".",
            ));
        }
    }
}
