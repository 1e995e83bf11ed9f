//! OpenAI and OpenAI-compatible vendors (Groq, Together, Anyscale,
//! DeepInfra, SambaNova).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::types::merge_extra;
use super::{send_json, BackendAdapter, Embedding, GenerateRequest, Generation, Usage};
use crate::config::ApiKey;
use crate::error::BackendError;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingUsage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

/// Adapter for the OpenAI REST dialect.
pub struct OpenAiAdapter {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    images: bool,
}

impl OpenAiAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            images: false,
        }
    }

    /// Enable `/images/generations` (only OpenAI itself serves it).
    pub fn with_images(mut self) -> Self {
        self.images = true;
        self
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
    }
}

#[async_trait]
impl BackendAdapter for OpenAiAdapter {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": request.prompt}));

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.params.max_tokens,
            "temperature": request.params.temperature,
        });
        if let Some(top_p) = request.params.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        merge_extra(&mut body, &request.params.extra);

        let response: ChatResponse = send_json(self.post("chat/completions", &body)).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                BackendError::InvalidResponse("response contained no message content".into())
            })?;

        Ok(Generation {
            text,
            usage: response.usage.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| request.model.to_string()),
        })
    }

    async fn embed(
        &self,
        text: &str,
        model: &str,
        extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Embedding, BackendError> {
        let mut body = serde_json::json!({"model": model, "input": text});
        merge_extra(&mut body, extra);

        let response: EmbeddingResponse = send_json(self.post("embeddings", &body)).await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| BackendError::InvalidResponse("response contained no embedding".into()))?;

        Ok(Embedding {
            vector,
            tokens: response.usage.map(|u| u.total_tokens),
            model: response.model.unwrap_or_else(|| model.to_string()),
        })
    }

    async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        quality: &str,
    ) -> Result<Vec<String>, BackendError> {
        if !self.images {
            return Err(BackendError::Unsupported {
                operation: "generate_image",
            });
        }

        let body = serde_json::json!({
            "prompt": prompt,
            "size": size,
            "quality": quality,
        });
        let response: ImageResponse = send_json(self.post("images/generations", &body)).await?;

        Ok(response.data.into_iter().filter_map(|d| d.url).collect())
    }
}
