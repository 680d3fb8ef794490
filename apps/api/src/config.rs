use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::ProviderKind;

const DEFAULT_BEDROCK_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";
/// Cheaper model used when the primary model is blocked by a marketplace subscription check.
const DEFAULT_BEDROCK_FALLBACK_MODEL_ID: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    /// Endpoint override for MinIO / local development. `None` targets AWS.
    pub s3_endpoint: Option<String>,
    pub aws_region: String,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub llm_provider: ProviderKind,
    pub bedrock_model_id: String,
    pub bedrock_fallback_model_id: String,
    pub gemini_api_key: Option<String>,
    /// HMAC secret for signed interview invites. Invites are rejected when unset.
    pub invite_secret: Option<String>,
    pub turn_min_gap: Duration,
    pub stream_min_gap: Duration,
    pub chat_min_gap: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: optional_env("S3_ENDPOINT"),
            aws_region: optional_env("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            aws_access_key_id: optional_env("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: optional_env("AWS_SECRET_ACCESS_KEY"),
            llm_provider: ProviderKind::from_flag(optional_env("LLM_PROVIDER").as_deref()),
            bedrock_model_id: optional_env("BEDROCK_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_BEDROCK_MODEL_ID.to_string()),
            bedrock_fallback_model_id: optional_env("BEDROCK_FALLBACK_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_BEDROCK_FALLBACK_MODEL_ID.to_string()),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            invite_secret: optional_env("INVITE_SECRET"),
            turn_min_gap: millis_env("TURN_MIN_GAP_MS", 1200)?,
            stream_min_gap: millis_env("STREAM_MIN_GAP_MS", 2500)?,
            chat_min_gap: millis_env("CHAT_MIN_GAP_MS", 1500)?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Static AWS keys were supplied. Bedrock is only used as a cross-provider
    /// fallback when this holds.
    pub fn has_bedrock_credentials(&self) -> bool {
        self.aws_access_key_id.is_some() && self.aws_secret_access_key.is_some()
    }

    pub fn has_gemini_credentials(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn millis_env(key: &str, default_ms: u64) -> Result<Duration> {
    let ms = match optional_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of milliseconds"))?,
        None => default_ms,
    };
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
impl Config {
    /// Configuration for router tests. Nothing here is ever dialled.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/zuri_test".to_string(),
            s3_bucket: "zuri-test".to_string(),
            s3_endpoint: Some("http://127.0.0.1:9".to_string()),
            aws_region: "us-east-1".to_string(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
            llm_provider: ProviderKind::Bedrock,
            bedrock_model_id: DEFAULT_BEDROCK_MODEL_ID.to_string(),
            bedrock_fallback_model_id: DEFAULT_BEDROCK_FALLBACK_MODEL_ID.to_string(),
            gemini_api_key: None,
            invite_secret: Some("test-invite-secret".to_string()),
            turn_min_gap: Duration::from_millis(1200),
            stream_min_gap: Duration::from_millis(2500),
            chat_min_gap: Duration::from_millis(1500),
            port: 0,
            rust_log: "debug".to_string(),
        }
    }
}
