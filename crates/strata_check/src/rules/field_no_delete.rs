//! FIELD_NO_DELETE: field numbers are not removed from a message.

use strata_image::Image;

use crate::rules::{surviving_files, surviving_messages, BREAKING_CATEGORIES};
use crate::{BreakingRule, Finding, Rule};

/// Reports field numbers a surviving message no longer has. Renames are
/// not deletions.
pub struct FieldNoDelete;

impl Rule for FieldNoDelete {
    fn id(&self) -> &str {
        "FIELD_NO_DELETE"
    }

    fn categories(&self) -> &[&'static str] {
        BREAKING_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that fields are not deleted from a given message."
    }
}

impl BreakingRule for FieldNoDelete {
    fn check(&self, image: &Image, against: &Image, findings: &mut Vec<Finding>) {
        for (previous_file, current_file) in surviving_files(image, against) {
            for (previous, current) in surviving_messages(previous_file, current_file) {
                for field in &previous.fields {
                    if current.field_by_number(field.number).is_some() {
                        continue;
                    }
                    findings.push(Finding::symbol(
                        current_file,
                        &current.full_name,
                        format!(
                            "Previously present field \"{}\" with name \"{}\" on message \"{}\" was deleted.",
                            field.number, field.name, current.name
                        ),
                    ));
                }
            }
        }
    }
}
