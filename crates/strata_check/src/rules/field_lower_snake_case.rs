//! FIELD_LOWER_SNAKE_CASE: field names are lower_snake_case.

use strata_image::{Image, ImageFile};

use crate::rules::naming::{is_lower_snake_case, to_lower_snake_case};
use crate::rules::LINT_CATEGORIES;
use crate::{Finding, LintRule, Rule};

/// Reports fields whose name is not lower_snake_case.
pub struct FieldLowerSnakeCase;

impl Rule for FieldLowerSnakeCase {
    fn id(&self) -> &str {
        "FIELD_LOWER_SNAKE_CASE"
    }

    fn categories(&self) -> &[&'static str] {
        LINT_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that field names are lower_snake_case."
    }
}

impl LintRule for FieldLowerSnakeCase {
    fn check_file(&self, file: &ImageFile, _image: &Image, findings: &mut Vec<Finding>) {
        for message in file.descriptor().all_messages() {
            for field in &message.fields {
                if is_lower_snake_case(&field.name) {
                    continue;
                }
                findings.push(Finding::symbol(
                    file,
                    &format!("{}.{}", message.full_name, field.name),
                    format!(
                        "Field name \"{}\" should be lower_snake_case, such as \"{}\".",
                        field.name,
                        to_lower_snake_case(&field.name)
                    ),
                ));
            }
        }
    }
}
