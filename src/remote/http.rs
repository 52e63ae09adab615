use super::{CompilerMessage, CompilerOutcome, Credential, RemoteCompiler, Submission};
use crate::error::CompilerError;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpCompilerConfig {
    pub base_url: String,
    /// Per-request timeout enforced by the HTTP client.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl HttpCompilerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Compiler client speaking JSON over HTTP.
///
/// `POST {base_url}/bots/{bot_id}/compile` with a bearer token. Status codes map
/// to outcomes: 2xx accepted, 400/422 rejected, 429 rate limited, 401/403
/// unauthorized, 5xx a transient server error.
pub struct HttpCompiler {
    config: HttpCompilerConfig,
    client: reqwest::Client,
}

impl HttpCompiler {
    pub fn new(config: HttpCompilerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_headers(credential: &Credential) -> Result<HeaderMap, CompilerError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", credential.token());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|e| CompilerError::InvalidRequest(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn build_payload(submission: &Submission) -> Value {
        json!({
            "bot_id": submission.bot_id,
            "environment": submission.target.as_str(),
            "artifact": submission.artifact,
            "scripts": submission.scripts,
        })
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn parse_accepted(body: &str) -> Result<CompilerOutcome, CompilerError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| CompilerError::Protocol(format!("invalid JSON: {}", e)))?;
        let version_id = ["version_id", "versionId", "version"]
            .iter()
            .find_map(|key| match value.get(*key)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| CompilerError::Protocol("accepted without a version id".into()))?;
        Ok(CompilerOutcome::Accepted { version_id })
    }

    /// Rejection bodies are `{"errors": [...]}` where each entry is either a string
    /// or an object with `message` and optional `node`. Anything else becomes a
    /// single message carrying the raw body.
    fn parse_rejection(body: &str) -> Vec<CompilerMessage> {
        let entries = serde_json::from_str::<Value>(body).ok().and_then(|v| {
            v.get("errors")
                .and_then(|e| e.as_array())
                .cloned()
        });

        let Some(entries) = entries else {
            let text = body.trim();
            let text = if text.is_empty() { "compiler rejected the artifact" } else { text };
            return vec![CompilerMessage::new(node_in_message(text), text)];
        };

        entries
            .iter()
            .map(|entry| match entry {
                Value::String(message) => CompilerMessage::new(node_in_message(message), message),
                other => {
                    let message = other
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string());
                    let node = other
                        .get("node")
                        .and_then(|n| n.as_i64().or_else(|| n.as_str()?.trim().parse().ok()))
                        .or_else(|| node_in_message(&message));
                    CompilerMessage::new(node, message)
                }
            })
            .collect()
    }
}

/// Finds the number following the word "node" in a free-text message. A capitalized
/// `Node N` names the subject of the message and wins over lowercase mentions, which
/// usually name a target.
pub(crate) fn node_in_message(message: &str) -> Option<i64> {
    let lower = message.to_ascii_lowercase();
    let mut first = None;
    let mut start = 0;
    while let Some(found) = lower[start..].find("node") {
        let index = start + found;
        start = index + 4;
        let after = lower[start..].trim_start_matches(|c: char| {
            c.is_whitespace() || c == '#' || c == ':' || c == '-'
        });
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        let Ok(number) = digits.parse() else {
            continue;
        };
        if message[index..].starts_with("Node") {
            return Some(number);
        }
        first.get_or_insert(number);
    }
    first
}

#[async_trait]
impl RemoteCompiler for HttpCompiler {
    async fn submit(
        &self,
        submission: &Submission,
        credential: &Credential,
    ) -> Result<CompilerOutcome, CompilerError> {
        let headers = Self::build_headers(credential)?;
        let url = format!(
            "{}/bots/{}/compile",
            self.config.base_url.trim_end_matches('/'),
            submission.bot_id
        );
        let timeout = Duration::from_secs(self.config.request_timeout_secs);

        debug!(%url, target = %submission.target, scripts = submission.scripts.len(), "submitting artifact");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(&Self::build_payload(submission))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompilerError::Timeout(timeout)
                } else {
                    CompilerError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| CompilerError::Network(e.to_string()))?;
        debug!(status = status.as_u16(), "compiler responded");

        match status {
            s if s.is_success() => Self::parse_accepted(&text),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(CompilerOutcome::Rejected {
                    errors: Self::parse_rejection(&text),
                })
            }
            StatusCode::TOO_MANY_REQUESTS => Ok(CompilerOutcome::RateLimited { retry_after }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(CompilerOutcome::Unauthorized),
            s if s.is_server_error() => Err(CompilerError::Server {
                status: s.as_u16(),
                message: text,
            }),
            s => Err(CompilerError::Protocol(format!(
                "unexpected status {}: {}",
                s.as_u16(),
                text
            ))),
        }
    }
}
