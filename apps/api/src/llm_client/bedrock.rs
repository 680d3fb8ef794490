//! Anthropic models on AWS Bedrock via `InvokeModel`.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::{CompletionBackend, LlmError, LlmResponse};
use crate::config::Config;

const ANTHROPIC_BEDROCK_VERSION: &str = "bedrock-2023-05-31";
const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct BedrockRequest<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    messages: Vec<BedrockMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct BedrockMessage<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct BedrockBackend {
    client: Client,
    model_id: String,
    fallback_model_id: String,
}

impl BedrockBackend {
    pub fn new(sdk: &aws_config::SdkConfig, config: &Config) -> Self {
        Self {
            client: Client::new(sdk),
            model_id: config.bedrock_model_id.clone(),
            fallback_model_id: config.bedrock_fallback_model_id.clone(),
        }
    }

    async fn invoke(&self, model_id: &str, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::to_vec(&BedrockRequest {
            anthropic_version: ANTHROPIC_BEDROCK_VERSION,
            max_tokens: MAX_TOKENS,
            messages: vec![BedrockMessage {
                role: "user",
                content: prompt,
            }],
        })?;

        let output = self
            .client
            .invoke_model()
            .model_id(model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .await
            .map_err(|e| LlmError::Bedrock(DisplayErrorContext(&e).to_string()))?;

        let response: LlmResponse = serde_json::from_slice(output.body().as_ref())?;
        if let Some(usage) = &response.usage {
            debug!(
                "Bedrock call succeeded: model={model_id}, input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }

        response
            .text()
            .map(str::to_string)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl CompletionBackend for BedrockBackend {
    fn name(&self) -> &'static str {
        "bedrock"
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match self.invoke(&self.model_id, prompt).await {
            Err(LlmError::Bedrock(message))
                if is_marketplace_denial(&message) && self.model_id != self.fallback_model_id =>
            {
                warn!(
                    "Model {} blocked by marketplace subscription; degrading to {}",
                    self.model_id, self.fallback_model_id
                );
                self.invoke(&self.fallback_model_id, prompt).await
            }
            other => other,
        }
    }
}

/// Access denials caused by a missing AWS Marketplace subscription for the
/// model, as opposed to plain IAM or throttling errors.
pub fn is_marketplace_denial(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("aws-marketplace")
        || (lower.contains("accessdenied") && lower.contains("subscri"))
        || lower.contains("model access is denied")
}
