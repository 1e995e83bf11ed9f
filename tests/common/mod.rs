//! Shared helpers for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use switchboard::backend::{
    AdapterKind, Backend, BackendAdapter, Embedding, GenerateRequest, Generation, Usage,
};
use switchboard::error::BackendError;
use switchboard::registry::Registry;
use switchboard::router::Executor;

/// One scripted reply: `Ok(text)` or `Err(status)`.
pub type Reply = Result<&'static str, u16>;

/// Adapter that plays back replies in order, then repeats the last one.
pub struct Scripted {
    replies: Mutex<VecDeque<Reply>>,
    last: Reply,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    pub fn new(replies: Vec<Reply>) -> Self {
        let last = *replies.last().expect("at least one reply");
        Self {
            replies: Mutex::new(replies.into()),
            last,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn ok(text: &'static str) -> Self {
        Self::new(vec![Ok(text)])
    }

    pub fn failing(status: u16) -> Self {
        Self::new(vec![Err(status)])
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn next(&self) -> Result<&'static str, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(self.last);
        reply.map_err(|status| BackendError::Status {
            status,
            body: "scripted".to_string(),
        })
    }
}

#[async_trait]
impl BackendAdapter for Scripted {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generation, BackendError> {
        let text = self.next()?;
        Ok(Generation {
            text: text.to_string(),
            usage: Usage::new(10, 20),
            model: request.model.to_string(),
        })
    }

    async fn embed(
        &self,
        _text: &str,
        model: &str,
        _extra: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Embedding, BackendError> {
        self.next()?;
        Ok(Embedding {
            vector: vec![1.0, 0.0],
            tokens: Some(3),
            model: model.to_string(),
        })
    }
}

pub fn backend(name: &str, adapter: Scripted) -> Backend {
    Backend::new(name, AdapterKind::Groq, adapter)
}

pub fn executor(backends: Vec<Backend>) -> Executor {
    Executor::new(Arc::new(Registry::from_backends(backends).unwrap()))
}
