//! Replicate predictions API. Text generation only.
//!
//! Replicate reports no token usage, so usage is approximated by counting
//! words in the prompt and the output.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::types::{merge_extra, word_count};
use super::{send_json, BackendAdapter, GenerateRequest, Generation, Usage};
use crate::config::ApiKey;
use crate::error::BackendError;

/// Delay between polls of a prediction that has not finished yet.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

/// Adapter for `POST /models/{owner}/{name}/predictions`.
///
/// Requests ask the API to hold the connection until the prediction is
/// done; a prediction still running after that is polled until it
/// settles. The backend timeout bounds the whole exchange.
pub struct ReplicateAdapter {
    client: Client,
    base_url: String,
    api_key: ApiKey,
}

impl ReplicateAdapter {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn settle(&self, mut prediction: Prediction) -> Result<Prediction, BackendError> {
        loop {
            if matches!(
                prediction.status.as_str(),
                "succeeded" | "failed" | "canceled"
            ) {
                return Ok(prediction);
            }

            let url = prediction
                .urls
                .as_ref()
                .and_then(|urls| urls.get.clone())
                .ok_or_else(|| {
                    BackendError::InvalidResponse(format!(
                        "prediction is '{}' with no polling url",
                        prediction.status
                    ))
                })?;

            tokio::time::sleep(POLL_INTERVAL).await;
            prediction = send_json(
                self.client
                    .get(url)
                    .bearer_auth(self.api_key.expose_secret()),
            )
            .await?;
        }
    }
}

/// Language models stream tokens, so output is usually a list of string
/// fragments; some models return one string.
fn output_text(output: serde_json::Value) -> Option<String> {
    match output {
        serde_json::Value::String(text) => Some(text),
        serde_json::Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect(),
        ),
        _ => None,
    }
}

#[async_trait]
impl BackendAdapter for ReplicateAdapter {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError> {
        let mut input = serde_json::json!({
            "prompt": request.prompt,
            "max_tokens": request.params.max_tokens,
            "temperature": request.params.temperature,
        });
        if let Some(system) = request.system {
            input["system_prompt"] = serde_json::json!(system);
        }
        if let Some(top_p) = request.params.top_p {
            input["top_p"] = serde_json::json!(top_p);
        }
        merge_extra(&mut input, &request.params.extra);

        let http_request = self
            .client
            .post(format!(
                "{}/models/{}/predictions",
                self.base_url, request.model
            ))
            .bearer_auth(self.api_key.expose_secret())
            .header("Prefer", "wait")
            .json(&serde_json::json!({ "input": input }));

        let prediction = self.settle(send_json(http_request).await?).await?;

        if prediction.status != "succeeded" {
            let detail = prediction
                .error
                .map(|e| match e {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_default();
            return Err(BackendError::InvalidResponse(format!(
                "prediction {}: {}",
                prediction.status, detail
            )));
        }

        let text = prediction
            .output
            .and_then(output_text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                BackendError::InvalidResponse("prediction produced no text output".into())
            })?;

        Ok(Generation {
            usage: Usage::new(word_count(request.prompt), word_count(&text)),
            text,
            model: request.model.to_string(),
        })
    }
}
