//! Request and response types shared by every adapter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Generation parameters passed through to the vendor.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Vendor-specific parameters merged into the request body as-is.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Token usage reported for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// What an adapter is asked to generate.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub prompt: &'a str,
    pub system: Option<&'a str>,
    pub model: &'a str,
    pub params: &'a GenerationParams,
}

/// Raw text generation returned by an adapter.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: Usage,
    pub model: String,
}

/// Raw embedding returned by an adapter.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    /// Tokens reported by the vendor, if any.
    pub tokens: Option<u32>,
    pub model: String,
}

/// A text generation as seen by callers: vendor output plus the latency
/// and cost the backend recorded for it.
#[derive(Debug, Clone)]
pub struct TextCompletion {
    pub text: String,
    pub usage: Usage,
    pub model: String,
    pub latency: Duration,
    pub cost: f64,
}

/// An embedding as seen by callers.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub vector: Vec<f32>,
    pub model: String,
    pub tokens: u32,
    pub latency: Duration,
    pub cost: f64,
}

/// Generated image URLs.
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub urls: Vec<String>,
    pub latency: Duration,
    pub cost: f64,
}

/// Whitespace word count, for vendors that report no token usage.
pub(crate) fn word_count(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// Merge free-form parameters into a JSON request body.
pub(crate) fn merge_extra(
    body: &mut serde_json::Value,
    extra: &serde_json::Map<String, serde_json::Value>,
) {
    if let Some(obj) = body.as_object_mut() {
        for (key, value) in extra {
            obj.insert(key.clone(), value.clone());
        }
    }
}
