//! The AI patch service: rewrites an artifact to address reported compiler errors.

mod http;

pub use http::{ChatPatchConfig, ChatPatchService};

use crate::error::PatchError;
use crate::remote::CompilerMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRequest {
    pub artifact: String,
    pub errors: Vec<CompilerMessage>,
    /// Free-form description of the bot, passed through to the model.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResponse {
    pub artifact: String,
    /// Human-readable descriptions of the changes, appended to the fix log.
    #[serde(default)]
    pub fixes: Vec<String>,
}

#[async_trait]
pub trait PatchService: Send + Sync {
    async fn request_patch(&self, request: &PatchRequest) -> Result<PatchResponse, PatchError>;
}
