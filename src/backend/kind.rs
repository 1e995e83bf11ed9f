//! Adapter type keys and their per-vendor defaults.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// The `type` of a configured provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    OpenAi,
    Groq,
    Together,
    Anyscale,
    DeepInfra,
    SambaNova,
    Anthropic,
    Replicate,
}

impl AdapterKind {
    /// Every known kind, in documentation order.
    pub const ALL: [AdapterKind; 8] = [
        AdapterKind::OpenAi,
        AdapterKind::Groq,
        AdapterKind::Together,
        AdapterKind::Anyscale,
        AdapterKind::DeepInfra,
        AdapterKind::SambaNova,
        AdapterKind::Anthropic,
        AdapterKind::Replicate,
    ];

    /// The configuration key for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::OpenAi => "openai",
            AdapterKind::Groq => "groq",
            AdapterKind::Together => "together",
            AdapterKind::Anyscale => "anyscale",
            AdapterKind::DeepInfra => "deepinfra",
            AdapterKind::SambaNova => "sambanova",
            AdapterKind::Anthropic => "anthropic",
            AdapterKind::Replicate => "replicate",
        }
    }

    /// Text model used when neither the config nor the caller names one.
    pub fn default_model(&self) -> &'static str {
        match self {
            AdapterKind::OpenAi => "gpt-4",
            AdapterKind::Groq => "mixtral-8x7b-32768",
            AdapterKind::Together => "togethercomputer/llama-2-70b",
            AdapterKind::Anyscale => "meta-llama/Llama-2-70b-chat-hf",
            AdapterKind::DeepInfra => "meta-llama/Llama-2-70b-chat-hf",
            AdapterKind::SambaNova => "sambanova-gpt",
            AdapterKind::Anthropic => "claude-2",
            AdapterKind::Replicate => "meta/llama-2-70b-chat",
        }
    }

    /// Embedding model used when none is configured.
    ///
    /// SambaNova derives its embedding model from the text model.
    pub fn default_embedding_model(&self, text_model: &str) -> String {
        match self {
            AdapterKind::OpenAi => "text-embedding-ada-002".to_string(),
            AdapterKind::Groq => "embed-english-v3".to_string(),
            AdapterKind::Together => "togethercomputer/m2-bert-80M-8k-base".to_string(),
            AdapterKind::Anyscale => "thenlper/gte-large".to_string(),
            AdapterKind::DeepInfra => "BAAI/bge-large-en-v1.5".to_string(),
            AdapterKind::SambaNova => format!("{}-embed", text_model),
            AdapterKind::Anthropic | AdapterKind::Replicate => String::new(),
        }
    }

    /// API root used when the provider config has no `base_url`.
    ///
    /// `None` means the vendor is self-hosted and a `base_url` is required.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            AdapterKind::OpenAi => Some("https://api.openai.com/v1"),
            AdapterKind::Groq => Some("https://api.groq.com/openai/v1"),
            AdapterKind::Together => Some("https://api.together.xyz/v1"),
            AdapterKind::Anyscale => Some("https://api.endpoints.anyscale.com/v1"),
            AdapterKind::DeepInfra => Some("https://api.deepinfra.com/v1/openai"),
            AdapterKind::SambaNova => None,
            AdapterKind::Anthropic => Some("https://api.anthropic.com/v1"),
            AdapterKind::Replicate => Some("https://api.replicate.com/v1"),
        }
    }

    /// Rate per 1000 tokens for models missing from the cost table.
    pub fn default_rate_per_1k(&self) -> f64 {
        match self {
            AdapterKind::OpenAi => 0.03,
            AdapterKind::Groq => 0.1,
            AdapterKind::Together => 0.2,
            AdapterKind::Anyscale => 0.15,
            AdapterKind::DeepInfra => 0.0,
            AdapterKind::SambaNova => 0.0,
            AdapterKind::Anthropic => 0.01,
            AdapterKind::Replicate => 0.2,
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdapterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownAdapter {
                kind: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        for kind in AdapterKind::ALL {
            assert_eq!(kind.as_str().parse::<AdapterKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_parse_unknown_kind() {
        let err = "cohere".parse::<AdapterKind>().unwrap_err();
        assert!(err.to_string().contains("cohere"));
        assert!(matches!(err, ConfigError::UnknownAdapter { .. }));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("OpenAI".parse::<AdapterKind>().is_err());
    }

    #[test]
    fn test_sambanova_requires_base_url() {
        assert!(AdapterKind::SambaNova.default_base_url().is_none());
        assert_eq!(
            AdapterKind::SambaNova.default_embedding_model("sambanova-gpt"),
            "sambanova-gpt-embed"
        );
    }

    #[test]
    fn test_replicate_defaults() {
        let kind: AdapterKind = "replicate".parse().unwrap();
        assert_eq!(kind, AdapterKind::Replicate);
        assert_eq!(kind.default_model(), "meta/llama-2-70b-chat");
        assert_eq!(kind.default_base_url(), Some("https://api.replicate.com/v1"));
        assert!((kind.default_rate_per_1k() - 0.2).abs() < 1e-12);
    }
}
