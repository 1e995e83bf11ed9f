//! Score-based backend selection.
//!
//! Every backend is scored from its current [`MetricsSummary`]:
//!
//! - cost: `1 / (total_cost + 1)`
//! - speed: `1 / (avg_latency + 1)`
//! - quality: `success_rate` (0.0 with no history)
//!
//! The weighted score sums `0.4 * cost`, `0.3 * speed` and `0.3 * quality`
//! for the requested criteria only. Weights are not renormalized when a
//! subset is requested.
//!
//! Ties go to the backend registered first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::metrics::MetricsSummary;
use crate::registry::Registry;

pub const COST_WEIGHT: f64 = 0.4;
pub const SPEED_WEIGHT: f64 = 0.3;
pub const QUALITY_WEIGHT: f64 = 0.3;

/// One scoring criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Cost,
    Speed,
    Quality,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [Criterion::Cost, Criterion::Speed, Criterion::Quality];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Cost => "cost",
            Criterion::Speed => "speed",
            Criterion::Quality => "quality",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Criterion::Cost => COST_WEIGHT,
            Criterion::Speed => SPEED_WEIGHT,
            Criterion::Quality => QUALITY_WEIGHT,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Criterion::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown criterion '{}'", s)))
    }
}

/// A subset of {cost, speed, quality}. Defaults to all three.
///
/// Serialized as a list of criterion names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Criterion>", into = "Vec<Criterion>")]
pub struct Criteria {
    cost: bool,
    speed: bool,
    quality: bool,
}

impl Criteria {
    pub fn all() -> Self {
        Self {
            cost: true,
            speed: true,
            quality: true,
        }
    }

    /// No criteria: every backend scores 0 and the first registered wins.
    pub fn none() -> Self {
        Self {
            cost: false,
            speed: false,
            quality: false,
        }
    }

    pub fn only(criterion: Criterion) -> Self {
        Self::none().with(criterion)
    }

    pub fn with(mut self, criterion: Criterion) -> Self {
        match criterion {
            Criterion::Cost => self.cost = true,
            Criterion::Speed => self.speed = true,
            Criterion::Quality => self.quality = true,
        }
        self
    }

    pub fn contains(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::Cost => self.cost,
            Criterion::Speed => self.speed,
            Criterion::Quality => self.quality,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Criterion> + '_ {
        Criterion::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<Criterion> for Criteria {
    fn from_iter<I: IntoIterator<Item = Criterion>>(iter: I) -> Self {
        iter.into_iter().fold(Criteria::none(), Criteria::with)
    }
}

impl From<Vec<Criterion>> for Criteria {
    fn from(criteria: Vec<Criterion>) -> Self {
        criteria.into_iter().collect()
    }
}

impl From<Criteria> for Vec<Criterion> {
    fn from(criteria: Criteria) -> Self {
        criteria.iter().collect()
    }
}

/// Component scores for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub cost: f64,
    pub speed: f64,
    pub quality: f64,
    pub weighted: f64,
}

impl ScoreBreakdown {
    pub fn compute(summary: &MetricsSummary, criteria: Criteria) -> Self {
        let cost = 1.0 / (summary.total_cost + 1.0);
        let speed = 1.0 / (summary.avg_latency + 1.0);
        let quality = summary.success_rate;

        let weighted = criteria
            .iter()
            .map(|c| {
                let component = match c {
                    Criterion::Cost => cost,
                    Criterion::Speed => speed,
                    Criterion::Quality => quality,
                };
                c.weight() * component
            })
            .sum();

        Self {
            cost,
            speed,
            quality,
            weighted,
        }
    }
}

/// Weighted score of a metrics summary under a criteria set.
pub fn score(summary: &MetricsSummary, criteria: Criteria) -> f64 {
    ScoreBreakdown::compute(summary, criteria).weighted
}

/// Picks the best backend for a request. Has no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct Selector {
    default_criteria: Criteria,
}

impl Selector {
    /// Selector using `default_criteria` for requests that name none.
    pub fn new(default_criteria: Criteria) -> Self {
        Self { default_criteria }
    }

    pub fn default_criteria(&self) -> Criteria {
        self.default_criteria
    }

    /// Score every backend, in registration order.
    pub fn rank<'a>(
        &self,
        registry: &'a Registry,
        criteria: Option<Criteria>,
    ) -> Vec<(&'a Backend, ScoreBreakdown)> {
        let criteria = criteria.unwrap_or(self.default_criteria);
        registry
            .backends()
            .iter()
            .map(|b| (b, ScoreBreakdown::compute(&b.metrics_summary(), criteria)))
            .collect()
    }

    /// Select the highest-scoring backend. The first maximum wins.
    pub fn select<'a>(
        &self,
        registry: &'a Registry,
        task: &str,
        criteria: Option<Criteria>,
    ) -> Result<&'a Backend> {
        let mut best: Option<(&Backend, f64)> = None;
        for (backend, breakdown) in self.rank(registry, criteria) {
            match best {
                Some((_, top)) if breakdown.weighted <= top => {}
                _ => best = Some((backend, breakdown.weighted)),
            }
        }

        let (backend, top) = best.ok_or(Error::NoBackends)?;
        tracing::debug!(
            task = %task,
            backend = %backend.name(),
            score = top,
            "Selected backend"
        );
        Ok(backend)
    }
}
