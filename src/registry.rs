//! The set of backends that exist for the life of the process.
//!
//! Backends are created once, in configuration order, and never removed
//! or replaced. That order is the canonical tie-break order for selection
//! and fallback.

use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    AdapterKind, AnthropicAdapter, Backend, OpenAiAdapter, ReplicateAdapter, DEFAULT_TIMEOUT,
};
use crate::config::{ConfigError, ProviderConfig};
use crate::cost::CostModel;
use crate::error::{Error, Result};
use crate::metrics::OutcomeSink;

/// Owns every registered backend.
#[derive(Debug)]
pub struct Registry {
    backends: Vec<Backend>,
}

impl Registry {
    /// Build a registry from already-constructed backends, keeping their order.
    pub fn from_backends(backends: Vec<Backend>) -> std::result::Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.name()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate provider name '{}'",
                    backend.name()
                )));
            }
        }
        Ok(Self { backends })
    }

    /// Build a registry from provider configs with default settings.
    pub fn from_config(providers: &[ProviderConfig]) -> std::result::Result<Self, ConfigError> {
        Self::builder().build(providers)
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Result<&Backend> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })
    }

    /// All backends in registration order.
    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Shared settings applied to every backend a registry constructs.
pub struct RegistryBuilder {
    client: Option<Client>,
    timeout: Duration,
    cost_model: Arc<CostModel>,
    sink: Option<Arc<dyn OutcomeSink>>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self {
            client: None,
            timeout: DEFAULT_TIMEOUT,
            cost_model: Arc::new(CostModel::standard()),
            sink: None,
        }
    }
}

impl RegistryBuilder {
    /// HTTP client shared by every adapter (connection pooling).
    pub fn http_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Timeout for backends without their own `timeout_secs`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = Arc::new(cost_model);
        self
    }

    /// Observer notified of every outcome recorded by any backend.
    pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Construct one backend per enabled provider, in order.
    ///
    /// Any invalid entry fails the whole load; a partially built
    /// registry is never returned.
    pub fn build(self, providers: &[ProviderConfig]) -> std::result::Result<Registry, ConfigError> {
        let client = self.client.clone().unwrap_or_default();
        let mut backends = Vec::with_capacity(providers.len());

        for provider in providers {
            if !provider.enabled {
                tracing::debug!(provider = %provider.name, "Skipping disabled provider");
                continue;
            }
            backends.push(self.build_backend(&client, provider)?);
        }

        let registry = Registry::from_backends(backends)?;
        tracing::info!(
            backends = registry.len(),
            names = ?registry.names(),
            "Registry loaded"
        );
        Ok(registry)
    }

    fn build_backend(
        &self,
        client: &Client,
        provider: &ProviderConfig,
    ) -> std::result::Result<Backend, ConfigError> {
        let kind: AdapterKind = provider.kind.parse()?;

        let api_key = provider
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingCredential {
                provider: provider.name.clone(),
            })?;

        let base_url = provider
            .base_url
            .clone()
            .or_else(|| kind.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "Provider '{}' of type '{}' requires base_url",
                    provider.name, kind
                ))
            })?;

        let backend = match kind {
            AdapterKind::Anthropic => Backend::new(
                &provider.name,
                kind,
                AnthropicAdapter::new(client.clone(), base_url, api_key),
            ),
            AdapterKind::Replicate => Backend::new(
                &provider.name,
                kind,
                ReplicateAdapter::new(client.clone(), base_url, api_key),
            ),
            AdapterKind::OpenAi => Backend::new(
                &provider.name,
                kind,
                OpenAiAdapter::new(client.clone(), base_url, api_key).with_images(),
            ),
            _ => Backend::new(
                &provider.name,
                kind,
                OpenAiAdapter::new(client.clone(), base_url, api_key),
            ),
        };

        let default_model = provider
            .default_model
            .clone()
            .unwrap_or_else(|| kind.default_model().to_string());
        let embedding_model = provider
            .embedding_model
            .clone()
            .unwrap_or_else(|| kind.default_embedding_model(&default_model));
        let timeout = provider
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);

        let mut backend = backend
            .with_default_model(default_model)
            .with_embedding_model(embedding_model)
            .with_timeout(timeout)
            .with_cost_model(self.cost_model.clone());
        if let Some(cost_per_token) = provider.cost_per_token {
            backend = backend.with_cost_per_token(cost_per_token);
        }
        if let Some(sink) = &self.sink {
            backend = backend.with_sink(sink.clone());
        }

        tracing::debug!(
            provider = %provider.name,
            kind = %kind,
            model = %backend.default_model(),
            "Registered backend"
        );
        Ok(backend)
    }
}
