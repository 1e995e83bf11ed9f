//! Scripted adapters for unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{BackendAdapter, Embedding, GenerateRequest, Generation, Usage};
use crate::error::BackendError;
use crate::metrics::{OutcomeRecord, OutcomeSink};

/// One scripted response.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Reply {
        text: String,
        tokens: u32,
        report_usage: bool,
    },
    Fail(u16),
    /// Never completes; only a timeout ends the call.
    Hang,
}

impl Step {
    pub(crate) fn reply(text: &str, tokens: u32) -> Self {
        Step::Reply {
            text: text.to_string(),
            tokens,
            report_usage: true,
        }
    }
}

/// Adapter that plays back a fixed sequence of steps, then repeats `then`.
pub(crate) struct ScriptedAdapter {
    steps: Mutex<VecDeque<Step>>,
    then: Step,
    embeddings: bool,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAdapter {
    pub(crate) fn always(step: Step) -> Self {
        Self::sequence(Vec::new(), step)
    }

    pub(crate) fn sequence(steps: Vec<Step>, then: Step) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            then,
            embeddings: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn without_embeddings(step: Step) -> Self {
        Self {
            embeddings: false,
            ..Self::always(step)
        }
    }

    /// Shared call counter, readable after the adapter is moved into a backend.
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn next_step(&self) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.then.clone())
    }
}

#[async_trait]
impl BackendAdapter for ScriptedAdapter {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError> {
        match self.next_step() {
            Step::Reply { text, tokens, .. } => Ok(Generation {
                text,
                usage: Usage::new(tokens / 2, tokens - tokens / 2),
                model: request.model.to_string(),
            }),
            Step::Fail(status) => Err(BackendError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Step::Hang => std::future::pending().await,
        }
    }

    async fn embed(
        &self,
        _text: &str,
        model: &str,
        _extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Embedding, BackendError> {
        if !self.embeddings {
            return Err(BackendError::Unsupported {
                operation: "embed_text",
            });
        }
        match self.next_step() {
            Step::Reply {
                tokens,
                report_usage,
                ..
            } => Ok(Embedding {
                vector: vec![0.1, 0.2, 0.3],
                tokens: report_usage.then_some(tokens),
                model: model.to_string(),
            }),
            Step::Fail(status) => Err(BackendError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Sink that keeps every record it is shown.
#[derive(Default)]
pub(crate) struct RecordingSink {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl RecordingSink {
    pub(crate) fn records(&self) -> Vec<OutcomeRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl OutcomeSink for RecordingSink {
    fn record(&self, record: &OutcomeRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}
