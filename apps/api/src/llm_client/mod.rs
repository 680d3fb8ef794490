/// LLM Client: the single point of entry for all completion calls in Zuri.
///
/// ARCHITECTURAL RULE: No other module may call a model provider directly.
/// All LLM interactions MUST go through `ProviderAdapter`.
///
/// Two backends are supported: Anthropic models hosted on AWS Bedrock (default)
/// and the Gemini generative-language API. The adapter issues one completion on
/// the configured backend and, if that fails and the other backend has
/// credentials, exactly one completion on the other.
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::AppError;

pub mod bedrock;
pub mod gemini;
pub mod prompts;

use bedrock::BedrockBackend;
use gemini::GeminiBackend;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Bedrock error: {0}")]
    Bedrock(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Throttling and quota exhaustion, detected by status code or message text.
    pub fn is_throttle(&self) -> bool {
        match self {
            LlmError::Api { status: 429, .. } => true,
            other => is_throttle_message(&other.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        if err.is_throttle() {
            AppError::RateLimited(err.to_string())
        } else {
            AppError::Llm(err.to_string())
        }
    }
}

pub fn is_throttle_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    [
        "throttl",
        "rate limit",
        "rate-limit",
        "ratelimit",
        "too many requests",
        "quota",
        "resource_exhausted",
        "resource has been exhausted",
        "status 429",
    ]
    .iter()
    .any(|pattern| lower.contains(pattern))
}

/// Which backend serves completions, chosen by `LLM_PROVIDER`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Bedrock,
    Gemini,
}

impl ProviderKind {
    /// Unset or unrecognised values select Bedrock; `gemini` in any case selects Gemini.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("gemini") => ProviderKind::Gemini,
            _ => ProviderKind::Bedrock,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Bedrock => "bedrock",
            ProviderKind::Gemini => "gemini",
        }
    }
}

/// One remote completion backend. Implementations issue a single logical
/// completion per call and return the model's raw text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Anthropic Messages response body (Bedrock returns the same shape).
#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

/// Configured backend plus the optional cross-provider fallback.
#[derive(Clone)]
pub struct ProviderAdapter {
    primary: Arc<dyn CompletionBackend>,
    fallback: Option<Arc<dyn CompletionBackend>>,
}

impl ProviderAdapter {
    pub fn new(
        primary: Arc<dyn CompletionBackend>,
        fallback: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Builds the configured backend, and the other one as fallback when its
    /// credentials are present.
    pub async fn from_config(config: &Config, sdk: &aws_config::SdkConfig) -> Self {
        let bedrock = || -> Arc<dyn CompletionBackend> { Arc::new(BedrockBackend::new(sdk, config)) };
        let gemini = |key: &str| -> Arc<dyn CompletionBackend> {
            Arc::new(GeminiBackend::new(key.to_string()))
        };

        let (primary, fallback) = match config.llm_provider {
            ProviderKind::Bedrock => (
                bedrock(),
                config.gemini_api_key.as_deref().map(gemini),
            ),
            ProviderKind::Gemini => {
                let fallback = config.has_bedrock_credentials().then(bedrock);
                match config.gemini_api_key.as_deref() {
                    Some(key) => (gemini(key), fallback),
                    None => {
                        warn!("LLM_PROVIDER=gemini but GEMINI_API_KEY is not set; using Bedrock");
                        (bedrock(), None)
                    }
                }
            }
        };

        info!(
            "LLM provider: {} (fallback: {})",
            primary.name(),
            fallback.as_ref().map(|f| f.name()).unwrap_or("none")
        );
        Self::new(primary, fallback)
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Runs one completion. No retries beyond the single cross-provider fallback;
    /// when both fail the configured backend's error is returned.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let primary_err = match self.primary.complete(prompt).await {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };

        warn!(
            "{} completion failed ({primary_err}); falling back to {}",
            self.primary.name(),
            fallback.name()
        );
        match fallback.complete(prompt).await {
            Ok(text) => Ok(text),
            Err(fallback_err) => {
                warn!("{} fallback also failed: {fallback_err}", fallback.name());
                Err(primary_err)
            }
        }
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
