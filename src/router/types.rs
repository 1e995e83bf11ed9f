//! Request and result types for the execution core.

use serde::{Deserialize, Serialize};

use super::Criteria;
use crate::backend::{GenerationParams, Usage};
use crate::error::{Error, Result};

/// Which backend capability a request uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    #[default]
    Generate,
    Embed,
}

/// One logical request to the routing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Opaque routing bucket; only logged and used for selection.
    pub task: String,
    /// Prompt for generation, or the text to embed.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
    /// Criteria for this request; the selector's default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,
    #[serde(default)]
    pub operation: Operation,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            prompt: prompt.into(),
            system: None,
            params: GenerationParams::default(),
            criteria: None,
            operation: Operation::Generate,
        }
    }

    /// An embedding request for `text`.
    pub fn embedding(task: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            operation: Operation::Embed,
            ..Self::new(task, text)
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    /// Reject requests that no backend should ever see.
    pub fn validate(&self) -> Result<()> {
        if self.task.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "task identifier must not be empty".to_string(),
            ));
        }
        if self.prompt.trim().is_empty() {
            let what = match self.operation {
                Operation::Generate => "prompt",
                Operation::Embed => "embedding input",
            };
            return Err(Error::InvalidRequest(format!("{} must not be empty", what)));
        }
        Ok(())
    }
}

/// What a successful execution produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Output {
    Text(String),
    Embedding(Vec<f32>),
}

/// Outcome of one logical request.
///
/// Exhaustion is a normal value here: `success` is false, `backend` is
/// `None` and `error` carries the primary backend's error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: Option<Output>,
    pub usage: Usage,
    pub cost: f64,
    pub latency_secs: f64,
    /// Backend that produced the output.
    pub backend: Option<String>,
    pub model: Option<String>,
    pub fallback_used: bool,
    pub error: Option<String>,
    /// Every backend invoked, in order.
    pub attempted: Vec<String>,
}

impl ExecutionResult {
    pub(crate) fn exhausted(error: String, fallback_used: bool, attempted: Vec<String>) -> Self {
        Self {
            success: false,
            output: None,
            usage: Usage::default(),
            cost: 0.0,
            latency_secs: 0.0,
            backend: None,
            model: None,
            fallback_used,
            error: Some(error),
            attempted,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.output {
            Some(Output::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match &self.output {
            Some(Output::Embedding(vector)) => Some(vector),
            _ => None,
        }
    }
}
