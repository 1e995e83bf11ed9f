//! Backend adapters and the outcome-recording wrapper around them.
//!
//! An adapter ([`BackendAdapter`]) only knows its vendor's wire format.
//! [`Backend`] wraps one adapter and applies the contract every call
//! shares, whichever vendor is behind it:
//! - wall-clock latency is measured around the call
//! - the call is bounded by a timeout; expiry is a failure
//! - success records tokens and cost from the [`CostModel`]
//! - failure records zero tokens/cost and the error is returned, never swallowed

mod anthropic;
mod kind;
mod openai;
mod replicate;
#[cfg(test)]
pub(crate) mod test_support;
mod types;

pub use anthropic::AnthropicAdapter;
pub use kind::AdapterKind;
pub use openai::OpenAiAdapter;
pub use replicate::ReplicateAdapter;
pub use types::{
    Embedding, EmbeddingOutput, GenerateRequest, Generation, GenerationParams, ImageOutput,
    TextCompletion, Usage,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::cost::CostModel;
use crate::error::BackendError;
use crate::metrics::{MetricsSummary, MetricsTracker, OutcomeRecord, OutcomeSink};

/// Per-invocation timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Wire-level access to one vendor's inference API.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Generate text for a prompt.
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError>;

    /// Embed a text.
    async fn embed(
        &self,
        _text: &str,
        _model: &str,
        _extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Embedding, BackendError> {
        Err(BackendError::Unsupported {
            operation: "embed_text",
        })
    }

    /// Generate images, returning their URLs.
    async fn generate_image(
        &self,
        _prompt: &str,
        _size: &str,
        _quality: &str,
    ) -> Result<Vec<String>, BackendError> {
        Err(BackendError::Unsupported {
            operation: "generate_image",
        })
    }
}

/// One named inference backend and its outcome history.
pub struct Backend {
    name: String,
    kind: AdapterKind,
    default_model: String,
    embedding_model: String,
    cost_per_token: Option<f64>,
    timeout: Duration,
    adapter: Box<dyn BackendAdapter>,
    cost_model: Arc<CostModel>,
    tracker: MetricsTracker,
    sink: Option<Arc<dyn OutcomeSink>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .field("records", &self.tracker.len())
            .finish()
    }
}

impl Backend {
    /// Create a backend with the kind's default models and pricing.
    pub fn new(
        name: impl Into<String>,
        kind: AdapterKind,
        adapter: impl BackendAdapter + 'static,
    ) -> Self {
        let default_model = kind.default_model().to_string();
        Self {
            name: name.into(),
            kind,
            embedding_model: kind.default_embedding_model(&default_model),
            default_model,
            cost_per_token: None,
            timeout: DEFAULT_TIMEOUT,
            adapter: Box::new(adapter),
            cost_model: Arc::new(CostModel::standard()),
            tracker: MetricsTracker::new(),
            sink: None,
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Price every token at this rate instead of the cost table.
    pub fn with_cost_per_token(mut self, cost_per_token: f64) -> Self {
        self.cost_per_token = Some(cost_per_token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cost_model(mut self, cost_model: Arc<CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AdapterKind {
        self.kind
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Effective rate per 1000 tokens for the default model.
    pub fn rate_per_1k(&self) -> f64 {
        match self.cost_per_token {
            Some(per_token) => per_token * 1000.0,
            None => self.cost_model.rate_per_1k(self.kind, &self.default_model),
        }
    }

    /// Generate text, recording exactly one outcome.
    pub async fn generate_text(
        &self,
        prompt: &str,
        system: Option<&str>,
        model: Option<&str>,
        params: &GenerationParams,
    ) -> Result<TextCompletion, BackendError> {
        let model = model.unwrap_or(&self.default_model);
        let request = GenerateRequest {
            prompt,
            system,
            model,
            params,
        };

        let (result, latency) = self.timed(self.adapter.generate(request)).await;
        match result {
            Ok(generation) => {
                let tokens = generation.usage.total_tokens;
                let cost = self
                    .cost_model
                    .token_cost(self.kind, model, tokens, self.cost_per_token);
                self.record_outcome(OutcomeRecord::success(
                    &self.name, model, latency, tokens, cost,
                ));

                tracing::debug!(
                    backend = %self.name,
                    model = %model,
                    tokens,
                    cost,
                    latency_ms = latency.as_millis() as u64,
                    "Generation completed"
                );

                Ok(TextCompletion {
                    text: generation.text,
                    usage: generation.usage,
                    model: generation.model,
                    latency,
                    cost,
                })
            }
            Err(e) => Err(self.fail(model, latency, e)),
        }
    }

    /// Embed a text, recording exactly one outcome.
    pub async fn embed_text(
        &self,
        text: &str,
        model: Option<&str>,
        extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<EmbeddingOutput, BackendError> {
        let model = model.unwrap_or(&self.embedding_model);

        let (result, latency) = self.timed(self.adapter.embed(text, model, extra)).await;
        match result {
            Ok(embedding) => {
                // Vendors that do not report usage are approximated by word count
                let tokens = embedding
                    .tokens
                    .unwrap_or_else(|| types::word_count(text));
                let cost = self.cost_model.embedding_cost(self.kind, model, tokens);
                self.record_outcome(OutcomeRecord::success(
                    &self.name, model, latency, tokens, cost,
                ));

                Ok(EmbeddingOutput {
                    vector: embedding.vector,
                    model: embedding.model,
                    tokens,
                    latency,
                    cost,
                })
            }
            Err(e) => Err(self.fail(model, latency, e)),
        }
    }

    /// Generate images, recording exactly one outcome.
    pub async fn generate_image(
        &self,
        prompt: &str,
        size: &str,
        quality: &str,
    ) -> Result<ImageOutput, BackendError> {
        let (result, latency) = self
            .timed(self.adapter.generate_image(prompt, size, quality))
            .await;
        match result {
            Ok(urls) => {
                let cost = self.cost_model.image_cost(size, quality) * urls.len() as f64;
                self.record_outcome(OutcomeRecord::success(
                    &self.name, "image", latency, 0, cost,
                ));
                Ok(ImageOutput {
                    urls,
                    latency,
                    cost,
                })
            }
            Err(e) => Err(self.fail("image", latency, e)),
        }
    }

    /// Append an outcome to this backend's history and notify the sink.
    pub fn record_outcome(&self, record: OutcomeRecord) {
        if let Some(sink) = &self.sink {
            sink.record(&record);
        }
        self.tracker.append(record);
    }

    pub fn metrics_summary(&self) -> MetricsSummary {
        self.tracker.summary()
    }

    /// Snapshot of the outcome history.
    pub fn outcomes(&self) -> Vec<OutcomeRecord> {
        self.tracker.records()
    }

    /// Run a vendor call under the timeout, measuring wall-clock latency.
    async fn timed<T, F>(&self, call: F) -> (Result<T, BackendError>, Duration)
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        };
        (result, start.elapsed())
    }

    fn fail(&self, model: &str, latency: Duration, error: BackendError) -> BackendError {
        tracing::warn!(
            backend = %self.name,
            model = %model,
            error = %error,
            latency_ms = latency.as_millis() as u64,
            "Backend call failed"
        );
        self.record_outcome(OutcomeRecord::failure(
            &self.name,
            model,
            latency,
            error.to_string(),
        ));
        error
    }
}

/// Send a JSON request and decode a JSON response.
///
/// Non-2xx statuses become [`BackendError::Status`] carrying the body text.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, BackendError> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::test_support::{RecordingSink, ScriptedAdapter, Step};
    use super::*;

    #[tokio::test]
    async fn test_success_records_tokens_and_cost() {
        let backend = Backend::new(
            "alpha",
            AdapterKind::OpenAi,
            ScriptedAdapter::always(Step::reply("hi", 2000)),
        )
        .with_default_model("gpt-3.5-turbo");

        let completion = backend
            .generate_text("hello", None, None, &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(completion.text, "hi");
        assert_eq!(completion.cost, (2000.0 / 1000.0) * 0.002);

        let outcomes = backend.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].tokens, 2000);
        assert_eq!(outcomes[0].model, "gpt-3.5-turbo");
        assert_eq!(outcomes[0].backend, "alpha");
    }

    #[tokio::test]
    async fn test_failure_records_and_propagates() {
        let backend = Backend::new(
            "alpha",
            AdapterKind::Groq,
            ScriptedAdapter::always(Step::Fail(503)),
        );

        let err = backend
            .generate_text("hello", None, None, &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));

        let outcomes = backend.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert_eq!(outcomes[0].tokens, 0);
        assert_eq!(outcomes[0].cost, 0.0);
        assert!(outcomes[0].error.as_deref().unwrap().contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_recorded_as_failure() {
        let backend = Backend::new("slow", AdapterKind::Groq, ScriptedAdapter::always(Step::Hang))
            .with_timeout(Duration::from_secs(5));

        let err = backend
            .generate_text("hello", None, None, &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Timeout(_)));

        let outcomes = backend.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].latency_secs >= 5.0);
    }

    #[tokio::test]
    async fn test_unsupported_embedding_is_recorded() {
        let backend = Backend::new(
            "claude",
            AdapterKind::Anthropic,
            ScriptedAdapter::without_embeddings(Step::reply("x", 1)),
        );

        let err = backend
            .embed_text("some text", None, &serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unsupported { .. }));
        assert_eq!(backend.metrics_summary().request_count, 1);
        assert_eq!(backend.metrics_summary().success_rate, 0.0);
    }

    #[tokio::test]
    async fn test_embedding_tokens_fall_back_to_word_count() {
        let backend = Backend::new(
            "alpha",
            AdapterKind::Together,
            ScriptedAdapter::always(Step::Reply {
                text: String::new(),
                tokens: 0,
                report_usage: false,
            }),
        );

        let output = backend
            .embed_text("one two three four", None, &serde_json::Map::new())
            .await
            .unwrap();
        assert_eq!(output.tokens, 4);
        assert_eq!(output.cost, 0.0);
        assert_eq!(output.model, "togethercomputer/m2-bert-80M-8k-base");
    }

    #[tokio::test]
    async fn test_sink_sees_every_outcome() {
        let sink = Arc::new(RecordingSink::default());
        let backend = Backend::new(
            "alpha",
            AdapterKind::Groq,
            ScriptedAdapter::sequence(vec![Step::Fail(500)], Step::reply("ok", 10)),
        )
        .with_sink(sink.clone());

        let params = GenerationParams::default();
        let _ = backend.generate_text("a", None, None, &params).await;
        let _ = backend.generate_text("b", None, None, &params).await;

        let seen = sink.records();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].success);
        assert!(seen[1].success);
    }

    #[tokio::test]
    async fn test_cost_per_token_override() {
        let backend = Backend::new(
            "alpha",
            AdapterKind::Groq,
            ScriptedAdapter::always(Step::reply("ok", 500)),
        )
        .with_cost_per_token(0.001);

        let completion = backend
            .generate_text("a", None, None, &GenerationParams::default())
            .await
            .unwrap();
        assert!((completion.cost - 0.5).abs() < 1e-12);
        assert!((backend.rate_per_1k() - 1.0).abs() < 1e-12);
    }
}
