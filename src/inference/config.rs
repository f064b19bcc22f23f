//! Model configuration loading and validation.
//!
//! Reads `config/models.yaml` and resolves environment variables.
//! Config is the single source of truth for provider endpoints, the model
//! bound to each pipeline role, and the pipeline's retry budgets.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::InferenceError;

/// Environment variable that points directly at a config file.
pub const CONFIG_ENV_VAR: &str = "AGENT_RELAY_CONFIG";

/// Relative location searched for when walking up from the working directory.
const CONFIG_RELATIVE_PATH: &str = "config/models.yaml";

// ─── Public Types ────────────────────────────────────────────────────────────

/// The job a model performs inside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    /// Intent extraction and model-backed classification.
    Intent,
    Planning,
    /// Draft generation and refactor.
    Reasoning,
    /// Verification and JSON repair.
    Verification,
    Writing,
    /// Simple responder.
    Chatting,
}

impl ModelRole {
    pub const ALL: [ModelRole; 6] = [
        ModelRole::Intent,
        ModelRole::Planning,
        ModelRole::Reasoning,
        ModelRole::Verification,
        ModelRole::Writing,
        ModelRole::Chatting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Intent => "intent",
            ModelRole::Planning => "planning",
            ModelRole::Reasoning => "reasoning",
            ModelRole::Verification => "verification",
            ModelRole::Writing => "writing",
            ModelRole::Chatting => "chatting",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OpenAI-compatible endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Bearer token. Usually `${SOME_API_KEY}` in the file.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A single role's model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Key into `ModelsConfig::providers`.
    pub provider: String,
    /// Model identifier sent in the request body.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Sends `reasoning: {enabled: ...}` when set.
    #[serde(default)]
    pub reasoning: Option<bool>,
    /// Use SSE streaming and collect the tokens.
    #[serde(default)]
    pub stream: bool,
    /// Transport-level attempts for retriable errors (connect, timeout, 5xx).
    #[serde(default = "default_transport_attempts")]
    pub transport_attempts: u32,
}

/// Retry budgets and request limits for the pipeline itself.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Total attempts for the model-backed classifier.
    #[serde(default = "default_classifier_retries")]
    pub classifier_retries: u32,
    /// Total attempts for each structured task stage.
    #[serde(default = "default_stage_retries")]
    pub stage_retries: u32,
    /// Longest accepted user message, in characters.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Name the simple responder introduces itself with.
    #[serde(default = "default_persona")]
    pub persona: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            classifier_retries: default_classifier_retries(),
            stage_retries: default_stage_retries(),
            max_message_length: default_max_message_length(),
            persona: default_persona(),
        }
    }
}

fn default_transport_attempts() -> u32 {
    2
}
fn default_classifier_retries() -> u32 {
    2
}
fn default_stage_retries() -> u32 {
    2
}
fn default_max_message_length() -> usize {
    5000
}
fn default_persona() -> String {
    "Relay".to_string()
}

/// Top-level configuration (mirrors `config/models.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub models: HashMap<ModelRole, ModelConfig>,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ModelsConfig {
    /// Check cross-references and budgets that serde cannot express.
    pub fn validate(&self) -> Result<(), InferenceError> {
        for (role, model) in &self.models {
            if !self.providers.contains_key(&model.provider) {
                return Err(InferenceError::ConfigError {
                    reason: format!(
                        "model for role '{role}' references unknown provider '{}'",
                        model.provider
                    ),
                });
            }
            if model.transport_attempts == 0 {
                return Err(InferenceError::ConfigError {
                    reason: format!("model for role '{role}' must allow at least one attempt"),
                });
            }
        }
        if self.pipeline.classifier_retries == 0 || self.pipeline.stage_retries == 0 {
            return Err(InferenceError::ConfigError {
                reason: "pipeline retry budgets must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Resolve the model and provider bound to `role`.
    pub fn resolve(&self, role: ModelRole) -> Result<(&ModelConfig, &ProviderConfig), InferenceError> {
        let model = self.models.get(&role).ok_or(InferenceError::UnknownRole {
            role: role.to_string(),
        })?;
        let provider = self
            .providers
            .get(&model.provider)
            .ok_or_else(|| InferenceError::ConfigError {
                reason: format!("unknown provider '{}'", model.provider),
            })?;
        Ok((model, provider))
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the configuration file.
///
/// `AGENT_RELAY_CONFIG` wins when set and the file exists; otherwise searches
/// upward from `start` for `config/models.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, InferenceError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(InferenceError::ConfigError {
        reason: format!("could not find {CONFIG_RELATIVE_PATH}"),
    })
}

/// Load, interpolate, parse and validate the configuration file.
///
/// String values matching `${VAR_NAME}` or `${VAR_NAME:-default}` are
/// replaced from the environment before parsing.
pub fn load_models_config(path: &Path) -> Result<ModelsConfig, InferenceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| InferenceError::ConfigError {
        reason: format!("failed to read {}: {e}", path.display()),
    })?;
    parse_models_config(&raw)
}

/// Parse configuration text (already read from disk).
pub fn parse_models_config(raw: &str) -> Result<ModelsConfig, InferenceError> {
    let interpolated = interpolate_env_vars(raw);

    let config: ModelsConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| InferenceError::ConfigError {
            reason: format!("failed to parse config: {e}"),
        })?;

    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
