//! FIELD_SAME_TYPE: a field number keeps its type.

use strata_image::Image;

use crate::rules::{surviving_files, surviving_messages, BREAKING_CATEGORIES};
use crate::{BreakingRule, Finding, Rule};

/// Reports fields whose type changed, matching fields by number.
pub struct FieldSameType;

impl Rule for FieldSameType {
    fn id(&self) -> &str {
        "FIELD_SAME_TYPE"
    }

    fn categories(&self) -> &[&'static str] {
        BREAKING_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that fields have the same type."
    }
}

impl BreakingRule for FieldSameType {
    fn check(&self, image: &Image, against: &Image, findings: &mut Vec<Finding>) {
        for (previous_file, current_file) in surviving_files(image, against) {
            for (previous, current) in surviving_messages(previous_file, current_file) {
                for field in &current.fields {
                    let Some(old) = previous.field_by_number(field.number) else {
                        continue;
                    };
                    if old.field_type == field.field_type {
                        continue;
                    }
                    findings.push(Finding::symbol(
                        current_file,
                        &format!("{}.{}", current.full_name, field.name),
                        format!(
                            "Field \"{}\" with name \"{}\" on message \"{}\" changed type from \"{}\" to \"{}\".",
                            field.number,
                            field.name,
                            current.name,
                            old.field_type.display_name(),
                            field.field_type.display_name()
                        ),
                    ));
                }
            }
        }
    }
}
