//! All built-in rule implementations.
//!
//! Lint rules inspect one target file at a time. Breaking rules compare the
//! target files of a previous image with their counterparts in the current
//! one; every built-in breaking rule belongs to the `FILE` category.

mod field_lower_snake_case;
mod field_no_delete;
mod field_same_type;
mod file_no_delete;
mod import_used;
mod message_no_delete;
mod message_pascal_case;
mod naming;
mod package_defined;
mod syntax_specified;

pub use field_lower_snake_case::FieldLowerSnakeCase;
pub use field_no_delete::FieldNoDelete;
pub use field_same_type::FieldSameType;
pub use file_no_delete::FileNoDelete;
pub use import_used::ImportUsed;
pub use message_no_delete::MessageNoDelete;
pub use message_pascal_case::MessagePascalCase;
pub use naming::{is_lower_snake_case, is_pascal_case, to_lower_snake_case, to_pascal_case};
pub use package_defined::PackageDefined;
pub use syntax_specified::SyntaxSpecified;

use std::collections::HashMap;

use strata_image::{Image, ImageFile, MessageDescriptor};

use crate::CheckEngine;

const LINT_CATEGORIES: &[&str] = &["DEFAULT", "STANDARD"];
const BREAKING_CATEGORIES: &[&str] = &["FILE"];

/// Registers the five built-in lint rules and four built-in breaking rules.
pub fn register_builtin_rules(engine: &mut CheckEngine) {
    engine.register_builtin_lint(Box::new(ImportUsed));
    engine.register_builtin_lint(Box::new(SyntaxSpecified));
    engine.register_builtin_lint(Box::new(PackageDefined));
    engine.register_builtin_lint(Box::new(MessagePascalCase));
    engine.register_builtin_lint(Box::new(FieldLowerSnakeCase));
    engine.register_builtin_breaking(Box::new(FileNoDelete));
    engine.register_builtin_breaking(Box::new(MessageNoDelete));
    engine.register_builtin_breaking(Box::new(FieldNoDelete));
    engine.register_builtin_breaking(Box::new(FieldSameType));
}

/// Pairs each target file of `against` with the file of the same path in
/// `image`, skipping files that no longer exist.
fn surviving_files<'a>(image: &'a Image, against: &'a Image) -> Vec<(&'a ImageFile, &'a ImageFile)> {
    against
        .target_files()
        .filter_map(|previous| image.get_file(previous.path()).map(|current| (previous, current)))
        .collect()
}

/// Pairs each message of `previous` with the message of the same full name
/// in `current`, skipping messages that no longer exist.
fn surviving_messages<'a>(
    previous: &'a ImageFile,
    current: &'a ImageFile,
) -> Vec<(&'a MessageDescriptor, &'a MessageDescriptor)> {
    let by_name: HashMap<&str, &MessageDescriptor> = current
        .descriptor()
        .all_messages()
        .into_iter()
        .map(|message| (message.full_name.as_str(), message))
        .collect();
    previous
        .descriptor()
        .all_messages()
        .into_iter()
        .filter_map(|message| by_name.get(message.full_name.as_str()).map(|current| (message, *current)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::image;
    use strata_common::Context;
    use strata_config::{BreakingConfig, FileVersion};

    const PREVIOUS: &str = "syntax = \"schema2\";\npackage acme.v1;\nmessage Pet {\n  string name = 1;\n  int64 age = 2;\n  string owner = 3;\n}\nmessage Toy {}\n";
    const CURRENT: &str = "syntax = \"schema2\";\npackage acme.v1;\nmessage Pet {\n  string title = 1;\n  string age = 2;\n}\n";

    fn run(config: &BreakingConfig) -> Vec<(String, String)> {
        let against = image(&[("pet.schema", PREVIOUS), ("gone.schema", "syntax = \"schema2\";\n")]);
        let image = image(&[("pet.schema", CURRENT)]);
        CheckEngine::new()
            .breaking(&Context::new(), &image, &against, config)
            .unwrap()
            .into_iter()
            .map(|annotation| (annotation.type_string, annotation.message))
            .collect()
    }

    #[test]
    fn file_category_reports_each_kind_of_break() {
        let found = run(&BreakingConfig::default_for(FileVersion::V2));
        assert_eq!(
            found,
            vec![
                (
                    "FILE_NO_DELETE".to_string(),
                    "Previously present file \"gone.schema\" was deleted.".to_string()
                ),
                (
                    "MESSAGE_NO_DELETE".to_string(),
                    "Previously present message \"acme.v1.Toy\" was deleted from file.".to_string()
                ),
                (
                    "FIELD_NO_DELETE".to_string(),
                    "Previously present field \"3\" with name \"owner\" on message \"Pet\" was deleted."
                        .to_string()
                ),
                (
                    "FIELD_SAME_TYPE".to_string(),
                    "Field \"2\" with name \"age\" on message \"Pet\" changed type from \"int64\" to \"string\"."
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn renamed_field_is_not_a_deletion() {
        let found = run(&BreakingConfig::default_for(FileVersion::V2));
        assert!(!found.iter().any(|(_, message)| message.contains("\"name\"")));
    }

    #[test]
    fn unstable_packages_can_be_ignored() {
        let previous = PREVIOUS.replace("acme.v1", "acme.v1beta1");
        let current = CURRENT.replace("acme.v1", "acme.v1beta1");
        let against = image(&[("pet.schema", previous.as_str())]);
        let image = image(&[("pet.schema", current.as_str())]);
        let mut config = BreakingConfig::default_for(FileVersion::V2);
        let engine = CheckEngine::new();
        let ctx = Context::new();
        assert!(!engine.breaking(&ctx, &image, &against, &config).unwrap().is_empty());
        config.ignore_unstable_packages = true;
        assert!(engine.breaking(&ctx, &image, &against, &config).unwrap().is_empty());
    }
}
