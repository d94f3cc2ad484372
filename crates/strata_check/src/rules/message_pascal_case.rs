//! MESSAGE_PASCAL_CASE: message names are PascalCase.

use strata_image::{Image, ImageFile};

use crate::rules::naming::{is_pascal_case, to_pascal_case};
use crate::rules::LINT_CATEGORIES;
use crate::{Finding, LintRule, Rule};

/// Reports messages, nested ones included, whose name is not PascalCase.
pub struct MessagePascalCase;

impl Rule for MessagePascalCase {
    fn id(&self) -> &str {
        "MESSAGE_PASCAL_CASE"
    }

    fn categories(&self) -> &[&'static str] {
        LINT_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that messages are PascalCase."
    }
}

impl LintRule for MessagePascalCase {
    fn check_file(&self, file: &ImageFile, _image: &Image, findings: &mut Vec<Finding>) {
        for message in file.descriptor().all_messages() {
            if !is_pascal_case(&message.name) {
                findings.push(Finding::symbol(
                    file,
                    &message.full_name,
                    format!(
                        "Message name \"{}\" should be PascalCase, such as \"{}\".",
                        message.name,
                        to_pascal_case(&message.name)
                    ),
                ));
            }
        }
    }
}
