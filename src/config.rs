//! Configuration loaded from a JSON file, with environment overrides for endpoints
//! and secrets.

use crate::error::ConfigError;
use crate::patch::ChatPatchConfig;
use crate::remote::{Credential, DeploymentTarget, HttpCompilerConfig};
use crate::repair::RepairConfig;
use crate::validator::ValidatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_COMPILER_URL: &str = "KENSA_COMPILER_URL";
pub const ENV_COMPILER_TOKEN: &str = "KENSA_COMPILER_TOKEN";
pub const ENV_PATCH_URL: &str = "KENSA_PATCH_URL";
pub const ENV_PATCH_API_KEY: &str = "KENSA_PATCH_API_KEY";
pub const ENV_PATCH_MODEL: &str = "KENSA_PATCH_MODEL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub target: DeploymentTarget,
    pub request_timeout_secs: u64,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            target: DeploymentTarget::Sandbox,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            request_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KensaConfig {
    pub repair: RepairConfig,
    pub validator: ValidatorConfig,
    pub compiler: CompilerSettings,
    pub patch: PatchSettings,
}

impl KensaConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Applies the `KENSA_*` environment variables on top of the loaded values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_COMPILER_URL) {
            self.compiler.base_url = Some(url);
        }
        if let Some(token) = get(ENV_COMPILER_TOKEN) {
            self.compiler.token = Some(token);
        }
        if let Some(url) = get(ENV_PATCH_URL) {
            self.patch.base_url = url;
        }
        if let Some(key) = get(ENV_PATCH_API_KEY) {
            self.patch.api_key = Some(key);
        }
        if let Some(model) = get(ENV_PATCH_MODEL) {
            self.patch.model = model;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repair.remote_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "repair.remote_timeout_secs must be positive".into(),
            ));
        }
        if self.repair.max_structural_passes == 0 {
            return Err(ConfigError::Invalid(
                "repair.max_structural_passes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn compiler_config(&self) -> Result<HttpCompilerConfig, ConfigError> {
        let base_url = self.compiler.base_url.clone().ok_or_else(|| {
            ConfigError::Invalid(format!("no compiler URL; set {}", ENV_COMPILER_URL))
        })?;
        Ok(HttpCompilerConfig {
            base_url,
            request_timeout_secs: self.compiler.request_timeout_secs,
        })
    }

    pub fn credential(&self) -> Result<Credential, ConfigError> {
        self.compiler
            .token
            .as_deref()
            .map(Credential::new)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("no compiler token; set {}", ENV_COMPILER_TOKEN))
            })
    }

    pub fn patch_config(&self) -> Result<ChatPatchConfig, ConfigError> {
        let api_key = self.patch.api_key.clone().ok_or_else(|| {
            ConfigError::Invalid(format!("no patch service key; set {}", ENV_PATCH_API_KEY))
        })?;
        Ok(ChatPatchConfig {
            api_key,
            base_url: self.patch.base_url.clone(),
            model: self.patch.model.clone(),
            request_timeout_secs: self.patch.request_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = KensaConfig::from_json(r#"{"repair": {"max_iterations": 2}}"#).unwrap();
        assert_eq!(config.repair.max_iterations, 2);
        assert_eq!(config.repair.default_retry_after_secs, 30);
        assert_eq!(config.validator, ValidatorConfig::default());
    }

    #[test]
    fn overrides_replace_endpoints_and_secrets() {
        let config = KensaConfig::default().with_overrides(|key| match key {
            ENV_COMPILER_URL => Some("http://compiler.local".into()),
            ENV_COMPILER_TOKEN => Some("secret".into()),
            ENV_PATCH_MODEL => Some(" ".into()),
            _ => None,
        });
        assert_eq!(config.compiler_config().unwrap().base_url, "http://compiler.local");
        assert_eq!(config.credential().unwrap().token(), "secret");
        assert_eq!(config.patch.model, "gpt-4o");
        assert!(config.patch_config().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = KensaConfig::from_json(r#"{"repair": {"remote_timeout_secs": 0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
