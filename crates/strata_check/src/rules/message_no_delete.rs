//! MESSAGE_NO_DELETE: messages are not deleted from a file.

use std::collections::HashSet;

use strata_image::Image;

use crate::rules::{surviving_files, BREAKING_CATEGORIES};
use crate::{BreakingRule, Finding, Rule};

/// Reports messages, nested ones included, that a surviving file lost.
pub struct MessageNoDelete;

impl Rule for MessageNoDelete {
    fn id(&self) -> &str {
        "MESSAGE_NO_DELETE"
    }

    fn categories(&self) -> &[&'static str] {
        BREAKING_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that messages are not deleted from a given file."
    }
}

impl BreakingRule for MessageNoDelete {
    fn check(&self, image: &Image, against: &Image, findings: &mut Vec<Finding>) {
        for (previous, current) in surviving_files(image, against) {
            let present: HashSet<&str> = current
                .descriptor()
                .all_messages()
                .into_iter()
                .map(|message| message.full_name.as_str())
                .collect();
            for message in previous.descriptor().all_messages() {
                if !present.contains(message.full_name.as_str()) {
                    findings.push(Finding::file(
                        current,
                        format!(
                            "Previously present message \"{}\" was deleted from file.",
                            message.full_name
                        ),
                    ));
                }
            }
        }
    }
}
