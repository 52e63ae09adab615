use super::{PatchRequest, PatchResponse, PatchService};
use crate::error::PatchError;
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You repair conversational bot definitions. The definition is a CSV \
file with one node per row. Fix only what the listed compiler errors require, never renumber or \
delete nodes, and keep every other row unchanged. Reply with a single JSON object: \
{\"csv\": \"<the complete corrected CSV>\", \"fixes\": [\"<one line per change>\"]}.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPatchConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    180
}

impl ChatPatchConfig {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Patch service backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatPatchService {
    config: ChatPatchConfig,
    client: reqwest::Client,
}

impl ChatPatchService {
    pub fn new(config: ChatPatchConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap, PatchError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|e| PatchError::InvalidRequest(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_payload(&self, request: &PatchRequest) -> Value {
        let errors = request.errors.iter().map(|e| format!("- {}", e)).join("\n");
        let user = format!(
            "Project context:\n{}\n\nCompiler errors:\n{}\n\nCSV:\n{}",
            request.context, errors, request.artifact
        );
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user },
            ],
            "temperature": 0,
        })
    }

    fn map_error(status: u16, body: &str, retry_after: Option<Duration>) -> PatchError {
        match status {
            401 | 403 => PatchError::Unauthorized(body.to_string()),
            429 => PatchError::RateLimited { retry_after },
            _ => PatchError::Api {
                status,
                message: body.to_string(),
            },
        }
    }

    fn parse_response(body: &Value) -> Result<PatchResponse, PatchError> {
        let content = body
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PatchError::Malformed("response has no message content".into()))?;
        parse_patch_content(content)
    }
}

/// Reads the model's JSON answer, with or without a surrounding code fence.
pub(crate) fn parse_patch_content(content: &str) -> Result<PatchResponse, PatchError> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json_text = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(PatchError::Malformed("no JSON object in reply".into())),
    };

    let value: Value = serde_json::from_str(json_text)
        .map_err(|e| PatchError::Malformed(format!("invalid JSON: {}", e)))?;
    let artifact = ["csv", "artifact"]
        .iter()
        .find_map(|key| value.get(*key)?.as_str())
        .filter(|csv| !csv.trim().is_empty())
        .ok_or_else(|| PatchError::Malformed("reply has no CSV".into()))?
        .to_string();
    let fixes = value
        .get("fixes")
        .and_then(|f| f.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(PatchResponse { artifact, fixes })
}

#[async_trait]
impl PatchService for ChatPatchService {
    async fn request_patch(&self, request: &PatchRequest) -> Result<PatchResponse, PatchError> {
        let headers = self.build_headers()?;
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        debug!(errors = request.errors.len(), model = %self.config.model, "requesting patch");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(&self.build_payload(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PatchError::Timeout(timeout)
                } else {
                    PatchError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .await
            .map_err(|e| PatchError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Self::map_error(status.as_u16(), &text, retry_after));
        }

        let body: Value =
            serde_json::from_str(&text).map_err(|e| PatchError::Malformed(e.to_string()))?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_reply_is_unwrapped() {
        let reply = "Here you go:\n```json\n{\"csv\": \"h\\n1,D\", \"fixes\": [\"Node 1: added message\"]}\n```";
        let patch = parse_patch_content(reply).unwrap();
        assert_eq!(patch.artifact, "h\n1,D");
        assert_eq!(patch.fixes, vec!["Node 1: added message"]);
    }

    #[test]
    fn reply_without_csv_is_malformed() {
        let err = parse_patch_content(r#"{"fixes": []}"#).unwrap_err();
        assert!(matches!(err, PatchError::Malformed(_)));
        assert!(parse_patch_content("I could not fix it").is_err());
    }
}
