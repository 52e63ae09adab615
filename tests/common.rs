//! Common test utilities for building artifacts and scripted remote collaborators.
use async_trait::async_trait;
use kensa::prelude::*;
use std::collections::VecDeque;
use std::result::Result;
use std::sync::Mutex;
use std::time::Duration;

/// A small, structurally valid bot.
///
/// `1 -> 100 -> 101 (ValidateEmail) -> 102 (end)`, plus the system error handler 99990.
#[allow(dead_code)]
pub fn sample_records() -> Vec<NodeRecord> {
    vec![
        NodeRecord::new(1, NodeKind::Decision, "Welcome")
            .with_message("Hi there!")
            .with_next_nodes([100]),
        NodeRecord::new(100, NodeKind::Decision, "Ask email")
            .with_message("What is your email?")
            .with_next_nodes([101]),
        NodeRecord::new(101, NodeKind::Action, "Check email")
            .with_command("ValidateEmail")
            .with_route("success", 102)
            .with_route("error", 99990),
        NodeRecord::new(102, NodeKind::Decision, "Thanks")
            .with_message("Thanks, we will be in touch.")
            .with_column(Column::NodeTags, "end"),
        NodeRecord::new(99990, NodeKind::Action, "Error handler")
            .with_command("HandleBotError")
            .with_route("error", 1),
    ]
}

#[allow(dead_code)]
pub fn sample_csv() -> String {
    Artifact::from_records(sample_records()).to_csv()
}

/// Builds an artifact line with the given leading columns; the rest are left empty.
#[allow(dead_code)]
pub fn csv_line(fields: &[(Column, &str)]) -> String {
    let mut columns = vec![String::new(); Column::ALL.len()];
    for (column, value) in fields {
        columns[column.index()] = kensa::artifact::encode_field(value);
    }
    columns.join(",")
}

#[allow(dead_code)]
pub fn csv_from_lines(lines: &[String]) -> String {
    let mut text = Column::header_line();
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// One submission as the compiler saw it.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SeenSubmission {
    pub artifact: String,
    pub token: String,
    pub at: tokio::time::Instant,
}

/// Replays a fixed sequence of compiler answers, then accepts everything.
#[allow(dead_code)]
pub struct ScriptedCompiler {
    answers: Mutex<VecDeque<Result<CompilerOutcome, CompilerError>>>,
    seen: Mutex<Vec<SeenSubmission>>,
}

#[allow(dead_code)]
impl ScriptedCompiler {
    pub fn new(answers: impl IntoIterator<Item = Result<CompilerOutcome, CompilerError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen(&self) -> Vec<SeenSubmission> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteCompiler for ScriptedCompiler {
    async fn submit(
        &self,
        submission: &Submission,
        credential: &Credential,
    ) -> Result<CompilerOutcome, CompilerError> {
        self.seen.lock().unwrap().push(SeenSubmission {
            artifact: submission.artifact.clone(),
            token: credential.token().to_string(),
            at: tokio::time::Instant::now(),
        });
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(CompilerOutcome::Accepted {
                    version_id: "v-final".to_string(),
                })
            })
    }
}

/// Rejects every line containing `BROKEN`, one error per line; accepts otherwise.
#[allow(dead_code)]
#[derive(Default)]
pub struct MarkerCompiler {
    pub submissions: Mutex<u32>,
}

#[async_trait]
impl RemoteCompiler for MarkerCompiler {
    async fn submit(
        &self,
        submission: &Submission,
        _credential: &Credential,
    ) -> Result<CompilerOutcome, CompilerError> {
        *self.submissions.lock().unwrap() += 1;
        let errors: Vec<CompilerMessage> = submission
            .artifact
            .lines()
            .filter(|line| line.contains("BROKEN"))
            .map(|line| CompilerMessage::new(None, format!("invalid row: {}", line)))
            .collect();
        if errors.is_empty() {
            Ok(CompilerOutcome::Accepted {
                version_id: "v1".to_string(),
            })
        } else {
            Ok(CompilerOutcome::Rejected { errors })
        }
    }
}

/// Replaces the first `BROKEN` marker per request.
#[allow(dead_code)]
#[derive(Default)]
pub struct MarkerPatcher {
    pub requests: Mutex<Vec<PatchRequest>>,
}

#[async_trait]
impl PatchService for MarkerPatcher {
    async fn request_patch(&self, request: &PatchRequest) -> Result<PatchResponse, PatchError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(PatchResponse {
            artifact: request.artifact.replacen("BROKEN", "fixed", 1),
            fixes: vec!["Replaced one broken value".to_string()],
        })
    }
}

/// Replays a fixed sequence of patch errors, then patches like [`MarkerPatcher`].
#[allow(dead_code)]
pub struct ScriptedPatcher {
    errors: Mutex<VecDeque<PatchError>>,
    calls: Mutex<u32>,
}

#[allow(dead_code)]
impl ScriptedPatcher {
    pub fn new(errors: impl IntoIterator<Item = PatchError>) -> Self {
        Self {
            errors: Mutex::new(errors.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PatchService for ScriptedPatcher {
    async fn request_patch(&self, request: &PatchRequest) -> Result<PatchResponse, PatchError> {
        *self.calls.lock().unwrap() += 1;
        let next = self.errors.lock().unwrap().pop_front();
        match next {
            Some(error) => Err(error),
            None => MarkerPatcher::default().request_patch(request).await,
        }
    }
}

/// Returns the artifact unchanged, or a fixed error when configured.
#[allow(dead_code)]
#[derive(Default)]
pub struct IdlePatcher {
    pub error: Option<PatchError>,
}

#[async_trait]
impl PatchService for IdlePatcher {
    async fn request_patch(&self, request: &PatchRequest) -> Result<PatchResponse, PatchError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(PatchResponse {
                artifact: request.artifact.clone(),
                fixes: vec![],
            }),
        }
    }
}

#[allow(dead_code)]
pub fn rejected(message: &str) -> Result<CompilerOutcome, CompilerError> {
    Ok(CompilerOutcome::Rejected {
        errors: vec![CompilerMessage::new(Some(100), message)],
    })
}

#[allow(dead_code)]
pub fn rate_limited(secs: u64) -> Result<CompilerOutcome, CompilerError> {
    Ok(CompilerOutcome::RateLimited {
        retry_after: Some(Duration::from_secs(secs)),
    })
}
