//! Fallback execution across backends.
//!
//! A request goes to the selected primary first. If it fails, every other
//! backend is tried strictly one at a time in registration order until one
//! succeeds. Exhaustion is returned as a failed [`ExecutionResult`], not
//! as an error.

use std::sync::Arc;
use std::time::Duration;

use super::types::{ExecutionResult, Operation, Output, TaskRequest};
use super::{RetryPolicy, Selector};
use crate::backend::{Backend, Usage};
use crate::error::{BackendError, Result};
use crate::registry::Registry;

/// Result of one successful backend invocation.
pub(super) struct Invocation {
    output: Output,
    usage: Usage,
    cost: f64,
    latency: Duration,
    model: String,
}

impl Invocation {
    pub(super) fn into_result(
        self,
        backend: &str,
        fallback_used: bool,
        attempted: Vec<String>,
    ) -> ExecutionResult {
        ExecutionResult {
            success: true,
            output: Some(self.output),
            usage: self.usage,
            cost: self.cost,
            latency_secs: self.latency.as_secs_f64(),
            backend: Some(backend.to_string()),
            model: Some(self.model),
            fallback_used,
            error: None,
            attempted,
        }
    }
}

/// Orchestrates requests over a shared registry.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<Registry>,
    selector: Selector,
    retry: RetryPolicy,
}

impl Executor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            selector: Selector::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Run a request on the selected backend, falling back on failure.
    ///
    /// Errors only for requests that are invalid or have no backend to
    /// run on. Backend failures never escape as `Err`.
    pub async fn execute_with_fallback(&self, request: &TaskRequest) -> Result<ExecutionResult> {
        request.validate()?;

        let primary = self
            .selector
            .select(&self.registry, &request.task, request.criteria)?;
        let mut attempted = vec![primary.name().to_string()];

        let primary_error = match self.invoke(primary, request).await {
            Ok(invocation) => return Ok(invocation.into_result(primary.name(), false, attempted)),
            Err(e) => e,
        };

        let candidates: Vec<&Backend> = self
            .registry
            .backends()
            .iter()
            .filter(|b| b.name() != primary.name())
            .collect();
        let fallback_used = !candidates.is_empty();

        for candidate in candidates {
            tracing::info!(
                task = %request.task,
                primary = %primary.name(),
                fallback = %candidate.name(),
                "Falling back to next backend"
            );
            attempted.push(candidate.name().to_string());

            match self.invoke(candidate, request).await {
                Ok(invocation) => {
                    return Ok(invocation.into_result(candidate.name(), true, attempted));
                }
                Err(e) => {
                    tracing::debug!(backend = %candidate.name(), error = %e, "Fallback failed");
                }
            }
        }

        tracing::warn!(
            task = %request.task,
            attempted = attempted.len(),
            error = %primary_error,
            "All backends failed"
        );
        Ok(ExecutionResult::exhausted(
            primary_error.to_string(),
            fallback_used,
            attempted,
        ))
    }

    /// Invoke one backend for a request. The backend records the outcome.
    pub(super) async fn invoke(
        &self,
        backend: &Backend,
        request: &TaskRequest,
    ) -> std::result::Result<Invocation, BackendError> {
        match request.operation {
            Operation::Generate => {
                let completion = backend
                    .generate_text(
                        &request.prompt,
                        request.system.as_deref(),
                        None,
                        &request.params,
                    )
                    .await?;
                Ok(Invocation {
                    output: Output::Text(completion.text),
                    usage: completion.usage,
                    cost: completion.cost,
                    latency: completion.latency,
                    model: completion.model,
                })
            }
            Operation::Embed => {
                let embedding = backend
                    .embed_text(&request.prompt, None, &request.params.extra)
                    .await?;
                Ok(Invocation {
                    output: Output::Embedding(embedding.vector),
                    usage: Usage::new(embedding.tokens, 0),
                    cost: embedding.cost,
                    latency: embedding.latency,
                    model: embedding.model,
                })
            }
        }
    }
}
