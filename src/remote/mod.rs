//! The authoritative external compiler, seen through a typed outcome.
//!
//! Every definitive answer is a [`CompilerOutcome`]; [`CompilerError`] is reserved
//! for calls that produced no answer (network, timeout, server failure). The client
//! never retries on its own.

mod http;

pub use http::{HttpCompiler, HttpCompilerConfig};

use crate::error::CompilerError;
use crate::scripts::ScriptSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The environment a submission is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentTarget {
    #[default]
    Sandbox,
    Production,
}

impl DeploymentTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentTarget::Sandbox => "sandbox",
            DeploymentTarget::Production => "production",
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API token. The value never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

/// One compile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub bot_id: String,
    pub artifact: String,
    pub scripts: Vec<ScriptSource>,
    pub target: DeploymentTarget,
}

impl Submission {
    pub fn new(bot_id: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            bot_id: bot_id.into(),
            artifact: artifact.into(),
            scripts: Vec::new(),
            target: DeploymentTarget::default(),
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
}

/// A compiler error message, keyed to a node when the compiler names one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerMessage {
    pub node: Option<i64>,
    pub message: String,
}

impl CompilerMessage {
    pub fn new(node: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            node,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "Node {}: {}", node, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerOutcome {
    Accepted { version_id: String },
    Rejected { errors: Vec<CompilerMessage> },
    /// `retry_after` is the compiler's hint, when it gave one.
    RateLimited { retry_after: Option<Duration> },
    /// The credential must be replaced before submitting again.
    Unauthorized,
}

#[async_trait]
pub trait RemoteCompiler: Send + Sync {
    async fn submit(
        &self,
        submission: &Submission,
        credential: &Credential,
    ) -> Result<CompilerOutcome, CompilerError>;
}
