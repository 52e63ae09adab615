use crate::remote::CompilerMessage;
use serde::Serialize;

/// What every repair invocation hands back, whatever the ending.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RepairReport {
    pub artifact_text: String,
    /// True only when the compiler accepted `artifact_text`.
    pub valid: bool,
    /// Patches applied.
    pub iterations: u32,
    pub fixes_applied: Vec<String>,
    pub remaining_errors: Vec<String>,
    pub version_id: Option<String>,
    /// Custom scripts shipped with the accepted submission.
    pub accepted_scripts: Vec<String>,
}

/// Mutable state of one repair invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairSession {
    pub(crate) iteration: u32,
    pub(crate) artifact: String,
    pub(crate) last_submitted: Option<String>,
    pub(crate) compiler_errors: Vec<CompilerMessage>,
    pub(crate) remaining_errors: Vec<String>,
    pub(crate) fixes_applied: Vec<String>,
    pub(crate) transient_failures: u32,
}

impl RepairSession {
    pub(crate) fn new(artifact: impl Into<String>) -> Self {
        Self {
            iteration: 0,
            artifact: artifact.into(),
            last_submitted: None,
            compiler_errors: Vec::new(),
            remaining_errors: Vec::new(),
            fixes_applied: Vec::new(),
            transient_failures: 0,
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn remaining_errors(&self) -> &[String] {
        &self.remaining_errors
    }

    pub fn fixes_applied(&self) -> &[String] {
        &self.fixes_applied
    }

    pub(crate) fn record_rejection(&mut self, errors: Vec<CompilerMessage>) {
        self.remaining_errors = errors.iter().map(ToString::to_string).collect();
        self.compiler_errors = errors;
    }

    /// A report on the artifact most recently submitted, or the current one when
    /// nothing was submitted yet.
    pub(crate) fn report_last_submitted(&self) -> RepairReport {
        RepairReport {
            artifact_text: self
                .last_submitted
                .clone()
                .unwrap_or_else(|| self.artifact.clone()),
            ..self.report()
        }
    }

    pub(crate) fn report(&self) -> RepairReport {
        RepairReport {
            artifact_text: self.artifact.clone(),
            valid: false,
            iterations: self.iteration,
            fixes_applied: self.fixes_applied.clone(),
            remaining_errors: self.remaining_errors.clone(),
            version_id: None,
            accepted_scripts: Vec::new(),
        }
    }

    pub(crate) fn accepted(&self, version_id: String, scripts: Vec<String>) -> RepairReport {
        RepairReport {
            valid: true,
            remaining_errors: Vec::new(),
            version_id: Some(version_id),
            accepted_scripts: scripts,
            ..self.report_last_submitted()
        }
    }
}
