//! The check engine: rule registration, selection, and execution.

use std::collections::BTreeSet;

use strata_common::{normalpath, Context};
use strata_config::{BreakingConfig, CheckConfig, LintConfig};
use strata_diagnostics::{dedup_and_sort, FileAnnotation};
use strata_image::Image;
use tracing::{debug, info};

use crate::error::CheckError;
use crate::{rules, BreakingRule, Finding, LintRule, Rule, CATEGORIES};

struct Registered<R: ?Sized> {
    rule: Box<R>,
    builtin: bool,
}

/// Holds the registered rules and runs the selected ones over images.
pub struct CheckEngine {
    lint_rules: Vec<Registered<dyn LintRule>>,
    breaking_rules: Vec<Registered<dyn BreakingRule>>,
}

impl CheckEngine {
    /// Creates an engine holding every built-in rule.
    pub fn new() -> Self {
        let mut engine = Self::empty();
        rules::register_builtin_rules(&mut engine);
        engine
    }

    /// Creates an engine with no rules.
    pub fn empty() -> Self {
        Self {
            lint_rules: Vec::new(),
            breaking_rules: Vec::new(),
        }
    }

    /// Registers a lint rule that is not built in.
    pub fn register_lint(&mut self, rule: Box<dyn LintRule>) {
        self.lint_rules.push(Registered {
            rule,
            builtin: false,
        });
    }

    /// Registers a breaking rule that is not built in.
    pub fn register_breaking(&mut self, rule: Box<dyn BreakingRule>) {
        self.breaking_rules.push(Registered {
            rule,
            builtin: false,
        });
    }

    pub(crate) fn register_builtin_lint(&mut self, rule: Box<dyn LintRule>) {
        self.lint_rules.push(Registered {
            rule,
            builtin: true,
        });
    }

    pub(crate) fn register_builtin_breaking(&mut self, rule: Box<dyn BreakingRule>) {
        self.breaking_rules.push(Registered {
            rule,
            builtin: true,
        });
    }

    /// Returns the number of registered lint rules.
    pub fn lint_rule_count(&self) -> usize {
        self.lint_rules.len()
    }

    /// Returns the number of registered breaking rules.
    pub fn breaking_rule_count(&self) -> usize {
        self.breaking_rules.len()
    }

    /// The IDs of the lint rules `check` selects, in registration order.
    pub fn lint_rule_ids(&self, check: &CheckConfig) -> Result<Vec<&str>, CheckError> {
        Ok(select(&self.lint_rules, check)?
            .into_iter()
            .map(|rule| rule.id())
            .collect())
    }

    /// The IDs of the breaking rules `check` selects, in registration order.
    pub fn breaking_rule_ids(&self, check: &CheckConfig) -> Result<Vec<&str>, CheckError> {
        Ok(select(&self.breaking_rules, check)?
            .into_iter()
            .map(|rule| rule.id())
            .collect())
    }

    /// Runs the selected lint rules over the target files of `image`.
    ///
    /// Import files are never checked. Findings under an ignored path are
    /// dropped; the rest come back deduplicated and sorted.
    pub fn lint(
        &self,
        ctx: &Context,
        image: &Image,
        config: &LintConfig,
    ) -> Result<Vec<FileAnnotation>, CheckError> {
        let rules = select(&self.lint_rules, &config.check)?;
        debug!("running {} lint rules", rules.len());
        let mut annotations = Vec::new();
        let mut file_count = 0;
        for file in image.target_files() {
            ctx.check()?;
            file_count += 1;
            for rule in &rules {
                let mut findings = Vec::new();
                rule.check_file(file, image, &mut findings);
                annotations.extend(
                    findings
                        .into_iter()
                        .filter(|finding| !is_ignored(&config.check, *rule, &finding.path))
                        .map(|finding| annotation(rule.id(), finding)),
                );
            }
        }
        let annotations = dedup_and_sort(annotations);
        info!(
            "lint found {} issues in {} files",
            annotations.len(),
            file_count
        );
        Ok(annotations)
    }

    /// Runs the selected breaking rules, comparing `image` to `against`.
    pub fn breaking(
        &self,
        ctx: &Context,
        image: &Image,
        against: &Image,
        config: &BreakingConfig,
    ) -> Result<Vec<FileAnnotation>, CheckError> {
        let rules = select(&self.breaking_rules, &config.check)?;
        debug!("running {} breaking rules", rules.len());
        let mut annotations = Vec::new();
        for rule in &rules {
            ctx.check()?;
            let mut findings = Vec::new();
            rule.check(image, against, &mut findings);
            for finding in findings {
                if is_ignored(&config.check, *rule, &finding.path) {
                    continue;
                }
                if config.ignore_unstable_packages && is_unstable_file(image, against, &finding.path) {
                    continue;
                }
                annotations.push(annotation(rule.id(), finding));
            }
        }
        let annotations = dedup_and_sort(annotations);
        info!("breaking found {} issues", annotations.len());
        Ok(annotations)
    }
}

impl Default for CheckEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `use` and `except` and drops built-in rules when they are
/// disabled. Unknown IDs are errors even when they would select nothing.
fn select<'a, R: Rule + ?Sized>(
    entries: &'a [Registered<R>],
    check: &CheckConfig,
) -> Result<Vec<&'a R>, CheckError> {
    let used = expand(entries, &check.use_ids)?;
    let excepted = expand(entries, &check.except_ids)?;
    for id in check.ignore_id_to_paths.keys() {
        expand(entries, std::slice::from_ref(id))?;
    }
    Ok(entries
        .iter()
        .filter(|entry| !(check.disable_builtin && entry.builtin))
        .map(|entry| entry.rule.as_ref())
        .filter(|rule| used.contains(rule.id()) && !excepted.contains(rule.id()))
        .collect())
}

fn expand<'a, R: Rule + ?Sized>(
    entries: &'a [Registered<R>],
    ids: &[String],
) -> Result<BTreeSet<&'a str>, CheckError> {
    let mut out = BTreeSet::new();
    for id in ids {
        let id = id.as_str();
        if let Some(entry) = entries.iter().find(|entry| entry.rule.id() == id) {
            out.insert(entry.rule.id());
            continue;
        }
        let members: Vec<&str> = entries
            .iter()
            .filter(|entry| entry.rule.categories().contains(&id))
            .map(|entry| entry.rule.id())
            .collect();
        if members.is_empty() && !CATEGORIES.contains(&id) {
            return Err(CheckError::UnknownRule { id: id.to_string() });
        }
        out.extend(members);
    }
    Ok(out)
}

fn is_ignored<R: Rule + ?Sized>(check: &CheckConfig, rule: &R, path: &str) -> bool {
    if check
        .ignore_paths
        .iter()
        .any(|ignore| normalpath::equals_or_contains(ignore, path))
    {
        return true;
    }
    check
        .ignore_id_to_paths
        .iter()
        .filter(|(id, _)| id.as_str() == rule.id() || rule.categories().contains(&id.as_str()))
        .any(|(_, paths)| {
            paths
                .iter()
                .any(|ignore| normalpath::equals_or_contains(ignore, path))
        })
}

fn is_unstable_file(image: &Image, against: &Image, path: &str) -> bool {
    image
        .get_file(path)
        .or_else(|| against.get_file(path))
        .is_some_and(|file| is_unstable_package(&file.descriptor().package))
}

/// Returns `true` if the last component of `package` is an alpha, beta, or
/// test version such as `v1alpha1`, `v2beta`, or `v1test`.
pub fn is_unstable_package(package: &str) -> bool {
    let last = package.rsplit('.').next().unwrap_or(package);
    let Some(rest) = last.strip_prefix('v') else {
        return false;
    };
    let suffix = rest.trim_start_matches(|c: char| c.is_ascii_digit());
    if suffix.len() == rest.len() {
        return false;
    }
    ["alpha", "beta", "test"].iter().any(|stage| {
        suffix
            .strip_prefix(stage)
            .is_some_and(|tail| tail.chars().all(|c| c.is_ascii_digit()))
    })
}

fn annotation(rule_id: &str, finding: Finding) -> FileAnnotation {
    let annotation = FileAnnotation::new(
        Some((finding.path, finding.external_path)),
        rule_id,
        finding.message,
    );
    match finding.location {
        Some(location) => annotation.at(
            location.start_line,
            location.start_column,
            location.end_line,
            location.end_column,
        ),
        None => annotation,
    }
}
