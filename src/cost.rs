//! Monetary cost of backend calls.
//!
//! Token-priced calls use a per-1000-token rate looked up by
//! (adapter kind, model). Models missing from the table fall back to the
//! kind's documented default rate. Images use a fixed price per
//! (size, quality) instead of token counts.

use std::collections::HashMap;

use crate::backend::AdapterKind;

/// Image price used when (size, quality) is not in the table.
pub const DEFAULT_IMAGE_PRICE: f64 = 0.020;

/// Rate tables used to price backend calls.
#[derive(Debug, Clone)]
pub struct CostModel {
    token_rates: HashMap<(AdapterKind, String), f64>,
    image_prices: HashMap<(String, String), f64>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::standard()
    }
}

impl CostModel {
    /// An empty model: every kind prices at its default rate.
    pub fn empty() -> Self {
        Self {
            token_rates: HashMap::new(),
            image_prices: HashMap::new(),
        }
    }

    /// Published vendor rates.
    pub fn standard() -> Self {
        let mut model = Self::empty()
            .with_rate(AdapterKind::OpenAi, "gpt-4", 0.03)
            .with_rate(AdapterKind::OpenAi, "gpt-4-32k", 0.06)
            .with_rate(AdapterKind::OpenAi, "gpt-3.5-turbo", 0.002)
            .with_rate(AdapterKind::OpenAi, "gpt-3.5-turbo-16k", 0.004)
            .with_rate(AdapterKind::Anthropic, "claude-2", 0.01)
            .with_rate(AdapterKind::Anthropic, "claude-instant-1", 0.0015);

        for (size, standard, hd) in [
            ("1024x1024", 0.020, 0.080),
            ("512x512", 0.018, 0.070),
            ("256x256", 0.016, 0.060),
        ] {
            model = model
                .with_image_price(size, "standard", standard)
                .with_image_price(size, "hd", hd);
        }

        model
    }

    /// Set the per-1000-token rate for one model.
    pub fn with_rate(mut self, kind: AdapterKind, model: &str, rate_per_1k: f64) -> Self {
        self.token_rates.insert((kind, model.to_string()), rate_per_1k);
        self
    }

    /// Set the fixed price of one image at (size, quality).
    pub fn with_image_price(mut self, size: &str, quality: &str, price: f64) -> Self {
        self.image_prices
            .insert((size.to_string(), quality.to_string()), price);
        self
    }

    /// Rate for a model that appears in the table.
    pub fn model_rate(&self, kind: AdapterKind, model: &str) -> Option<f64> {
        self.token_rates.get(&(kind, model.to_string())).copied()
    }

    /// Effective per-1000-token rate: table entry, else the kind's default.
    pub fn rate_per_1k(&self, kind: AdapterKind, model: &str) -> f64 {
        self.model_rate(kind, model)
            .unwrap_or_else(|| kind.default_rate_per_1k())
    }

    /// Cost of a text generation: `(tokens / 1000) * rate`.
    ///
    /// A configured per-token price overrides the table.
    pub fn token_cost(
        &self,
        kind: AdapterKind,
        model: &str,
        tokens: u32,
        cost_per_token: Option<f64>,
    ) -> f64 {
        let rate = match cost_per_token {
            Some(per_token) => per_token * 1000.0,
            None => self.rate_per_1k(kind, model),
        };
        (f64::from(tokens) / 1000.0) * rate
    }

    /// Cost of an embedding call. Unlisted embedding models are free.
    pub fn embedding_cost(&self, kind: AdapterKind, model: &str, tokens: u32) -> f64 {
        self.model_rate(kind, model)
            .map(|rate| (f64::from(tokens) / 1000.0) * rate)
            .unwrap_or(0.0)
    }

    /// Price of one generated image.
    pub fn image_cost(&self, size: &str, quality: &str) -> f64 {
        self.image_prices
            .get(&(size.to_string(), quality.to_string()))
            .copied()
            .unwrap_or(DEFAULT_IMAGE_PRICE)
    }
}
