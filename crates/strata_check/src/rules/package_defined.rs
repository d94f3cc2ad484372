//! PACKAGE_DEFINED: every file declares a package.

use strata_image::{Image, ImageFile};

use crate::{Finding, LintRule, Rule};

/// Reports files without a `package` statement.
pub struct PackageDefined;

impl Rule for PackageDefined {
    fn id(&self) -> &str {
        "PACKAGE_DEFINED"
    }

    fn categories(&self) -> &[&'static str] {
        &["MINIMAL", "DEFAULT", "STANDARD"]
    }

    fn purpose(&self) -> &str {
        "Checks that all files have a package defined."
    }
}

impl LintRule for PackageDefined {
    fn check_file(&self, file: &ImageFile, _image: &Image, findings: &mut Vec<Finding>) {
        if file.descriptor().package.is_empty() {
            findings.push(Finding::file(file, "Files must have a package defined."));
        }
    }
}
