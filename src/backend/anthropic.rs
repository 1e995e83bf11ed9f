//! Anthropic messages API. Text generation only.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::types::merge_extra;
use super::{send_json, BackendAdapter, GenerateRequest, Generation, Usage};
use crate::config::ApiKey;
use crate::error::BackendError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Adapter for Anthropic's `/messages` endpoint.
pub struct AnthropicAdapter {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl AnthropicAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl BackendAdapter for AnthropicAdapter {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError> {
        let mut body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.params.max_tokens,
            "temperature": request.params.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(system) = request.system {
            body["system"] = serde_json::json!(system);
        }
        if let Some(top_p) = request.params.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        merge_extra(&mut body, &request.params.extra);

        let http_request = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);

        let response: MessagesResponse = send_json(http_request).await?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(BackendError::InvalidResponse(
                "response contained no text content".into(),
            ));
        }

        let usage = response
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();

        Ok(Generation {
            text,
            usage,
            model: response.model.unwrap_or_else(|| request.model.to_string()),
        })
    }
}
