//! Gemini generative-language API backend.
//!
//! Model availability differs between API versions and accounts, so a call
//! walks `API_VERSIONS` x `MODEL_ALIASES` until one combination answers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CompletionBackend, LlmError};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSIONS: [&str; 2] = ["v1beta", "v1"];
const MODEL_ALIASES: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-flash-latest", "gemini-1.5-pro"];
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(GEMINI_BASE_URL, api_key)
    }

    fn with_base_url(base_url: &str, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }

    async fn generate(&self, version: &str, model: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/{version}/models/{model}:generateContent", self.base_url);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.6,
                max_output_tokens: 1024,
            },
        };

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Http(e.without_url()))?;
        parsed.text().ok_or(LlmError::EmptyContent)
    }
}

/// Errors that no other version/alias combination can fix: throttling, bad
/// credentials, and an unreachable or unresponsive endpoint.
fn is_terminal(err: &LlmError) -> bool {
    match err {
        LlmError::Api { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                || *status == StatusCode::UNAUTHORIZED.as_u16()
                || *status == StatusCode::FORBIDDEN.as_u16()
        }
        LlmError::Http(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut last_error = LlmError::EmptyContent;

        for version in API_VERSIONS {
            for model in MODEL_ALIASES {
                match self.generate(version, model, prompt).await {
                    Ok(text) => {
                        debug!("Gemini call succeeded: {version}/{model}");
                        return Ok(text);
                    }
                    Err(err) if is_terminal(&err) => return Err(err),
                    Err(err) => {
                        warn!("Gemini {version}/{model} failed: {err}");
                        last_error = err;
                    }
                }
            }
        }

        Err(last_error)
    }
}
