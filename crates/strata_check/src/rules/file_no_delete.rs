//! FILE_NO_DELETE: files are not deleted.

use strata_image::Image;

use crate::rules::BREAKING_CATEGORIES;
use crate::{BreakingRule, Finding, Rule};

/// Reports target files of the previous image that are gone.
pub struct FileNoDelete;

impl Rule for FileNoDelete {
    fn id(&self) -> &str {
        "FILE_NO_DELETE"
    }

    fn categories(&self) -> &[&'static str] {
        BREAKING_CATEGORIES
    }

    fn purpose(&self) -> &str {
        "Checks that files are not deleted."
    }
}

impl BreakingRule for FileNoDelete {
    fn check(&self, image: &Image, against: &Image, findings: &mut Vec<Finding>) {
        for previous in against.target_files() {
            if image.get_file(previous.path()).is_none() {
                findings.push(Finding::file(
                    previous,
                    format!("Previously present file \"{}\" was deleted.", previous.path()),
                ));
            }
        }
    }
}
