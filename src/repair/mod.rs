//! The repair loop: sanitize, fix structurally, submit, patch, repeat.
//!
//! ```text
//! Sanitizing -> StructuralFix -> RemoteValidating -> Patching -> RemoteValidating ...
//!                                      |
//!                                      +-> Done | Exhausted | NeedsCredential
//! ```
//!
//! Only an auth failure of the patch service and an exhausted transient retry budget
//! end a session as [`RepairOutcome::Failed`]. Unexpected compiler responses are
//! retried under that budget; unusable patch replies spend an iteration.
//!
//! One [`RepairOrchestrator::run`] is one transaction over one artifact. Callers must
//! not run two sessions for the same bot at once; the orchestrator holds no lock.

mod events;
mod sanitize;
mod session;

pub use events::{EventReceiver, EventSender, RepairEvent, RepairPhase, create_event_channel};
pub use sanitize::{Sanitized, sanitize};
pub use session::{RepairReport, RepairSession};

use crate::error::{CompilerError, PatchError, RepairError};
use crate::patch::{PatchRequest, PatchService};
use crate::remote::{CompilerOutcome, Credential, DeploymentTarget, RemoteCompiler, Submission};
use crate::scripts::ScriptSource;
use crate::validator::{StructuralValidator, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const MAX_TRANSIENT_BACKOFF: Duration = Duration::from_secs(60);

/// Limits and timings of the repair loop. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Patches applied before giving up.
    pub max_iterations: u32,
    /// Consecutive transient failures tolerated before the session fails.
    pub max_transient_retries: u32,
    /// Wait used when a rate limit carries no retry-after hint.
    pub default_retry_after_secs: u64,
    pub remote_timeout_secs: u64,
    /// First backoff after a network failure or timeout; doubles per failure, capped at 60s.
    pub transient_backoff_secs: u64,
    pub max_structural_passes: u32,
    /// Run the structural fixer again on every patched artifact.
    pub restructure_after_patch: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_transient_retries: 5,
            default_retry_after_secs: 30,
            remote_timeout_secs: 120,
            transient_backoff_secs: 2,
            max_structural_passes: 10,
            restructure_after_patch: true,
        }
    }
}

impl RepairConfig {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }

    /// Backoff before the retry following `failures` consecutive transient failures.
    pub fn transient_backoff(&self, failures: u32) -> Duration {
        let factor = 1u64 << failures.saturating_sub(1).min(16);
        Duration::from_secs(self.transient_backoff_secs.saturating_mul(factor))
            .min(MAX_TRANSIENT_BACKOFF)
    }
}

/// Everything needed to repair and submit one bot's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairRequest {
    pub bot_id: String,
    pub artifact: String,
    pub scripts: Vec<ScriptSource>,
    pub target: DeploymentTarget,
    /// Project description handed to the patch service.
    pub context: String,
}

impl RepairRequest {
    pub fn new(bot_id: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            artifact: artifact.into(),
            scripts: Vec::new(),
            target: DeploymentTarget::default(),
            context: String::new(),
        }
    }

    pub fn with_scripts(mut self, scripts: Vec<ScriptSource>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_target(mut self, target: DeploymentTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A session parked because the compiler rejected the credential. Hand it back to
/// [`RepairOrchestrator::resume`] with a new credential.
#[derive(Debug, Clone)]
pub struct SuspendedRepair {
    request: RepairRequest,
    session: RepairSession,
}

impl SuspendedRepair {
    pub fn iteration(&self) -> u32 {
        self.session.iteration
    }

    pub fn artifact(&self) -> &str {
        &self.session.artifact
    }

    pub fn request(&self) -> &RepairRequest {
        &self.request
    }

    /// The best artifact so far, for callers that give up instead of resuming.
    pub fn report(&self) -> RepairReport {
        self.session.report()
    }
}

#[derive(Debug)]
pub enum RepairOutcome {
    /// The compiler accepted the artifact.
    Done(RepairReport),
    /// Iterations ran out; the report holds the last submitted artifact.
    Exhausted(RepairReport),
    Cancelled(RepairReport),
    Failed {
        report: RepairReport,
        error: RepairError,
    },
    NeedsCredential(SuspendedRepair),
}

impl RepairOutcome {
    pub fn phase(&self) -> RepairPhase {
        match self {
            RepairOutcome::Done(_) => RepairPhase::Done,
            RepairOutcome::Exhausted(_) => RepairPhase::Exhausted,
            RepairOutcome::Cancelled(_) => RepairPhase::Cancelled,
            RepairOutcome::Failed { .. } => RepairPhase::Failed,
            RepairOutcome::NeedsCredential(_) => RepairPhase::NeedsCredential,
        }
    }

    /// The best-known artifact and its state. A suspended session reports its
    /// current artifact.
    pub fn report(&self) -> RepairReport {
        match self {
            RepairOutcome::Done(report)
            | RepairOutcome::Exhausted(report)
            | RepairOutcome::Cancelled(report)
            | RepairOutcome::Failed { report, .. } => report.clone(),
            RepairOutcome::NeedsCredential(suspended) => suspended.report(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, RepairOutcome::Done(_))
    }
}

/// Drives one artifact to acceptance by the remote compiler.
pub struct RepairOrchestrator {
    compiler: Arc<dyn RemoteCompiler>,
    patcher: Arc<dyn PatchService>,
    validator: StructuralValidator,
    config: RepairConfig,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl RepairOrchestrator {
    pub fn new(compiler: Arc<dyn RemoteCompiler>, patcher: Arc<dyn PatchService>) -> Self {
        Self {
            compiler,
            patcher,
            validator: StructuralValidator::default(),
            config: RepairConfig::default(),
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: RepairConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validator(mut self, config: ValidatorConfig) -> Self {
        self.validator = StructuralValidator::new(config);
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Cancelling the token stops the session at the next phase boundary or
    /// backoff wait. In-flight network calls are not interrupted.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub async fn run(&self, request: RepairRequest, credential: &Credential) -> RepairOutcome {
        let mut session = RepairSession::new(request.artifact.clone());
        info!(bot = %request.bot_id, target = %request.target, "repair started");

        if self.cancel.is_cancelled() {
            return self.cancelled(&session);
        }
        self.enter(&session, RepairPhase::Sanitizing);
        let sanitized = sanitize(&session.artifact);
        session.artifact = sanitized.text.clone();
        if let Some(description) = sanitized.describe() {
            debug!(%description, "artifact sanitized");
            self.log_fixes(&mut session, vec![description]);
        }

        if self.cancel.is_cancelled() {
            return self.cancelled(&session);
        }
        self.enter(&session, RepairPhase::StructuralFix);
        self.structural_fix(&mut session);

        self.drive(request, session, credential).await
    }

    /// Continues a suspended session at remote validation with a new credential.
    /// The iteration count is carried over unchanged.
    pub async fn resume(&self, suspended: SuspendedRepair, credential: &Credential) -> RepairOutcome {
        let SuspendedRepair {
            request,
            mut session,
        } = suspended;
        info!(bot = %request.bot_id, iteration = session.iteration, "repair resumed");
        session.transient_failures = 0;
        self.drive(request, session, credential).await
    }

    async fn drive(
        &self,
        request: RepairRequest,
        mut session: RepairSession,
        credential: &Credential,
    ) -> RepairOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled(&session);
            }
            self.enter(&session, RepairPhase::RemoteValidating);

            let submission = Submission::new(request.bot_id.clone(), session.artifact.clone())
                .with_scripts(request.scripts.clone())
                .with_target(request.target);
            session.last_submitted = Some(session.artifact.clone());

            let timeout = self.config.remote_timeout();
            let result = tokio::time::timeout(timeout, self.compiler.submit(&submission, credential))
                .await
                .unwrap_or(Err(CompilerError::Timeout(timeout)));

            match result {
                Ok(CompilerOutcome::Accepted { version_id }) => {
                    info!(%version_id, iteration = session.iteration, "artifact accepted");
                    session.transient_failures = 0;
                    self.enter(&session, RepairPhase::Done);
                    let scripts = submission.scripts.iter().map(|s| s.name.clone()).collect();
                    return RepairOutcome::Done(session.accepted(version_id, scripts));
                }
                Ok(CompilerOutcome::Rejected { errors }) => {
                    session.transient_failures = 0;
                    info!(errors = errors.len(), iteration = session.iteration, "artifact rejected");
                    session.record_rejection(errors);

                    if session.iteration >= self.config.max_iterations {
                        return self.exhausted(&session);
                    }
                    if self.cancel.is_cancelled() {
                        return self.cancelled(&session);
                    }
                    if let Err(outcome) = self.patch(&request, &mut session).await {
                        return outcome;
                    }
                }
                Ok(CompilerOutcome::RateLimited { retry_after }) => {
                    let delay = retry_after.unwrap_or_else(|| self.config.default_retry_after());
                    if let Err(outcome) = self.backoff(&mut session, delay, "rate limited").await {
                        return outcome;
                    }
                }
                Ok(CompilerOutcome::Unauthorized) => {
                    warn!(bot = %request.bot_id, "compiler rejected the credential; suspending");
                    self.enter(&session, RepairPhase::NeedsCredential);
                    return RepairOutcome::NeedsCredential(SuspendedRepair { request, session });
                }
                Err(error) => {
                    if !error.is_transient() {
                        warn!(%error, "unexpected compiler response; retrying");
                    }
                    let delay = self.config.transient_backoff(session.transient_failures + 1);
                    if let Err(outcome) =
                        self.backoff(&mut session, delay, &error.to_string()).await
                    {
                        return outcome;
                    }
                }
            }
        }
    }

    /// Requests a patch for the last rejection and installs it as the current artifact.
    async fn patch(
        &self,
        request: &RepairRequest,
        session: &mut RepairSession,
    ) -> Result<(), RepairOutcome> {
        self.enter(session, RepairPhase::Patching);
        let patch_request = PatchRequest {
            artifact: session.artifact.clone(),
            errors: session.compiler_errors.clone(),
            context: request.context.clone(),
        };

        let response = loop {
            let timeout = self.config.remote_timeout();
            let result = tokio::time::timeout(timeout, self.patcher.request_patch(&patch_request))
                .await
                .unwrap_or(Err(PatchError::Timeout(timeout)));

            match result {
                Ok(response) => break response,
                Err(error @ PatchError::Unauthorized(_)) => {
                    return Err(self.failed(session, error.into()));
                }
                Err(error) if error.is_transient() => {
                    let delay = match &error {
                        PatchError::RateLimited { retry_after } => {
                            retry_after.unwrap_or_else(|| self.config.default_retry_after())
                        }
                        _ => self.config.transient_backoff(session.transient_failures + 1),
                    };
                    self.backoff(session, delay, &error.to_string()).await?;
                }
                Err(error) => {
                    // An unusable reply spends an iteration; the artifact stays as submitted.
                    warn!(%error, iteration = session.iteration, "patch attempt failed");
                    session.transient_failures = 0;
                    self.log_fixes(session, vec![format!("Patch attempt failed: {}", error)]);
                    session.iteration += 1;
                    if session.iteration >= self.config.max_iterations {
                        return Err(self.exhausted(session));
                    }
                    if self.cancel.is_cancelled() {
                        return Err(self.cancelled(session));
                    }
                }
            }
        };
        session.transient_failures = 0;

        let sanitized = sanitize(&response.artifact);
        session.artifact = sanitized.text.clone();
        let mut fixes = response.fixes;
        if fixes.is_empty() {
            fixes.push(format!(
                "Patch addressed {} compiler errors",
                session.compiler_errors.len()
            ));
        }
        fixes.extend(sanitized.describe());
        self.log_fixes(session, fixes);

        if self.config.restructure_after_patch {
            self.structural_fix(session);
        }
        session.iteration += 1;
        info!(iteration = session.iteration, "patch applied");
        Ok(())
    }

    /// Applies structural fixes until none is left or a pass stops reducing the
    /// issue count.
    fn structural_fix(&self, session: &mut RepairSession) {
        let mut previous = usize::MAX;
        for pass in 0..self.config.max_structural_passes {
            let report = self.validator.validate(&session.artifact, true);
            debug!(
                pass,
                issues = report.issues.len(),
                fixable = report.fixable_count(),
                "structural pass"
            );

            let stalled = report.issues.len() >= previous;
            previous = report.issues.len();
            if report.fixable_count() == 0 || report.applied_fixes.is_empty() || stalled {
                if session.compiler_errors.is_empty() {
                    session.remaining_errors =
                        report.issues.iter().map(ToString::to_string).collect();
                }
                break;
            }
            if let Some(text) = report.fixed_artifact {
                session.artifact = text;
            }
            self.log_fixes(session, report.applied_fixes);
        }
    }

    async fn backoff(
        &self,
        session: &mut RepairSession,
        delay: Duration,
        reason: &str,
    ) -> Result<(), RepairOutcome> {
        session.transient_failures += 1;
        if session.transient_failures > self.config.max_transient_retries {
            warn!(attempts = session.transient_failures, %reason, "transient retry budget exhausted");
            let error = RepairError::RetryBudgetExhausted {
                attempts: session.transient_failures,
                last: reason.to_string(),
            };
            return Err(self.failed(session, error));
        }

        info!(
            attempt = session.transient_failures,
            delay_secs = delay.as_secs_f64(),
            %reason,
            "waiting before retry"
        );
        self.emit(RepairEvent::Waiting {
            iteration: session.iteration,
            attempt: session.transient_failures,
            delay,
            reason: reason.to_string(),
        });

        tokio::select! {
            _ = self.cancel.cancelled() => Err(self.cancelled(session)),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn log_fixes(&self, session: &mut RepairSession, fixes: Vec<String>) {
        if fixes.is_empty() {
            return;
        }
        self.emit(RepairEvent::FixesApplied {
            iteration: session.iteration,
            fixes: fixes.clone(),
        });
        session.fixes_applied.extend(fixes);
    }

    fn exhausted(&self, session: &RepairSession) -> RepairOutcome {
        warn!(iterations = session.iteration, "repair iterations exhausted");
        self.enter(session, RepairPhase::Exhausted);
        RepairOutcome::Exhausted(session.report_last_submitted())
    }

    fn cancelled(&self, session: &RepairSession) -> RepairOutcome {
        info!(iteration = session.iteration, "repair cancelled");
        self.enter(session, RepairPhase::Cancelled);
        RepairOutcome::Cancelled(session.report_last_submitted())
    }

    fn failed(&self, session: &RepairSession, error: RepairError) -> RepairOutcome {
        warn!(%error, "repair failed");
        self.enter(session, RepairPhase::Failed);
        RepairOutcome::Failed {
            report: session.report_last_submitted(),
            error,
        }
    }

    fn enter(&self, session: &RepairSession, phase: RepairPhase) {
        debug!(iteration = session.iteration, %phase, "repair phase");
        self.emit(RepairEvent::PhaseEntered {
            iteration: session.iteration,
            phase,
            errors: session.remaining_errors.clone(),
        });
    }

    fn emit(&self, event: RepairEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}
