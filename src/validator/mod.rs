//! Local structural checks over an artifact, with conservative auto-fixes.
//!
//! The validator never fails: whatever the input, it returns a report. Every check
//! runs on every pass, and the issue list always describes the text that was passed
//! in. When fixes are requested, the fixed text is returned alongside; validating
//! that text again yields no auto-fixable issue.

mod checks;
mod fixes;

use crate::artifact::{Artifact, Column, NodeRecord};
use crate::constants::{DEFAULT_FALLBACK_NODE, ENDPOINT_TAGS};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// One problem found in the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub node: i64,
    pub field: Column,
    pub message: String,
    pub auto_fixable: bool,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node {} [{}]: {}", self.node, self.field, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationReport {
    /// True when no issue of any kind was found in the input.
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
    /// The repaired text. Present whenever fixes were requested, even if nothing changed.
    pub fixed_artifact: Option<String>,
    /// Descriptions of the fixes that took effect, in application order.
    pub applied_fixes: Vec<String>,
}

impl ValidationReport {
    pub fn fixable_count(&self) -> usize {
        self.issues.iter().filter(|i| i.auto_fixable).count()
    }

    /// Issues that need a human or a patch to resolve.
    pub fn manual_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.auto_fixable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Preferred target for re-pointed references. When absent from the artifact,
    /// the nearest existing node is used instead.
    pub fallback_node: Option<i64>,
    /// Tags marking a Decision node as an intended end of conversation.
    pub endpoint_tags: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fallback_node: Some(DEFAULT_FALLBACK_NODE),
            endpoint_tags: ENDPOINT_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl ValidatorConfig {
    pub(crate) fn is_endpoint(&self, record: &NodeRecord) -> bool {
        [Column::NodeTags, Column::Behaviors]
            .into_iter()
            .flat_map(|column| record.column_tokens(column))
            .any(|token| {
                self.endpoint_tags
                    .iter()
                    .any(|tag| tag.eq_ignore_ascii_case(token))
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    config: ValidatorConfig,
}

impl StructuralValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Parses and validates artifact text, optionally applying every available fix.
    pub fn validate(&self, artifact_text: &str, auto_fix: bool) -> ValidationReport {
        let mut artifact = Artifact::parse(artifact_text);
        self.validate_artifact(&mut artifact, auto_fix)
    }

    /// Validates a parsed artifact in place. With `auto_fix`, the fixes are applied
    /// to `artifact` itself.
    pub fn validate_artifact(&self, artifact: &mut Artifact, auto_fix: bool) -> ValidationReport {
        let findings = checks::run_all(artifact.records(), &self.config);
        let (issues, fixes): (Vec<_>, Vec<_>) = findings
            .into_iter()
            .map(|finding| (finding.issue, finding.fix))
            .unzip();

        debug!(
            records = artifact.len(),
            issues = issues.len(),
            fixable = fixes.iter().flatten().count(),
            "structural checks complete"
        );

        let mut report = ValidationReport {
            valid: issues.is_empty(),
            issues,
            ..Default::default()
        };

        if auto_fix {
            report.applied_fixes = fixes::apply_all(artifact, fixes.iter().flatten());
            if !report.applied_fixes.is_empty() {
                info!(count = report.applied_fixes.len(), "applied structural fixes");
            }
            report.fixed_artifact = Some(artifact.to_csv());
        }
        report
    }

    /// Runs the checks over records without parsing or fixing.
    pub fn check(&self, records: &[NodeRecord]) -> Vec<ValidationIssue> {
        checks::run_all(records, &self.config)
            .into_iter()
            .map(|finding| finding.issue)
            .collect()
    }
}
