//! IMPORT_USED: every import provides a symbol the file uses.

use strata_image::{Image, ImageFile};

use crate::rules::LINT_CATEGORIES;
use crate::{Finding, LintRule, Rule};

/// Reports imports that the file never references.
pub struct ImportUsed;

impl Rule for ImportUsed {
    fn id(&self) -> &str {
        "IMPORT_USED"
    }

    fn categories(&self) -> &[&'static str] {
        LINT_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that imports are used."
    }
}

impl LintRule for ImportUsed {
    fn check_file(&self, file: &ImageFile, _image: &Image, findings: &mut Vec<Finding>) {
        let dependencies = &file.descriptor().dependencies;
        for index in file.unused_dependency_indexes() {
            if let Some(dependency) = dependencies.get(*index) {
                findings.push(Finding::file(file, format!("Import \"{dependency}\" is unused.")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::image;

    #[test]
    fn unused_import_is_reported_once() {
        let image = image(&[
            (
                "a.schema",
                "syntax = \"schema2\";\npackage a;\nimport \"b.schema\";\nimport \"c.schema\";\nmessage A { B b = 1; }\n",
            ),
            ("b.schema", "syntax = \"schema2\";\nmessage B {}\n"),
            ("c.schema", "syntax = \"schema2\";\nmessage C {}\n"),
        ]);
        let mut findings = Vec::new();
        let file = image.get_file("a.schema").unwrap();
        ImportUsed.check_file(file, &image, &mut findings);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].message, "Import \"c.schema\" is unused.");
        assert_eq!(findings[0].location, None);
    }
}
