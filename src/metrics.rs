//! Per-backend outcome history and aggregate summaries.
//!
//! Each backend owns one [`MetricsTracker`]. Records are append-only and
//! the summary is recomputed from them on demand, so the scorer always
//! sees the full history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Immutable log entry of one backend invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeRecord {
    pub timestamp: DateTime<Utc>,
    /// Wall-clock span around the vendor call, in seconds.
    pub latency_secs: f64,
    pub tokens: u32,
    pub cost: f64,
    pub success: bool,
    pub error: Option<String>,
    pub backend: String,
    pub model: String,
}

impl OutcomeRecord {
    /// Record for a call that completed.
    pub fn success(
        backend: impl Into<String>,
        model: impl Into<String>,
        latency: Duration,
        tokens: u32,
        cost: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_secs: latency.as_secs_f64(),
            tokens,
            cost,
            success: true,
            error: None,
            backend: backend.into(),
            model: model.into(),
        }
    }

    /// Record for a call that failed. Tokens and cost are always zero.
    pub fn failure(
        backend: impl Into<String>,
        model: impl Into<String>,
        latency: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            latency_secs: latency.as_secs_f64(),
            tokens: 0,
            cost: 0.0,
            success: false,
            error: Some(error.into()),
            backend: backend.into(),
            model: model.into(),
        }
    }
}

/// Aggregates derived from a backend's outcome history.
///
/// With no history every field is zero, including `success_rate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub total_cost: f64,
    pub avg_latency: f64,
    pub total_tokens: u64,
    pub request_count: usize,
    pub success_count: usize,
    pub success_rate: f64,
}

impl MetricsSummary {
    /// Compute a summary over a slice of records.
    pub fn from_records(records: &[OutcomeRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let count = records.len();
        let success_count = records.iter().filter(|r| r.success).count();

        Self {
            total_cost: records.iter().map(|r| r.cost).sum(),
            avg_latency: records.iter().map(|r| r.latency_secs).sum::<f64>() / count as f64,
            total_tokens: records.iter().map(|r| u64::from(r.tokens)).sum(),
            request_count: count,
            success_count,
            success_rate: success_count as f64 / count as f64,
        }
    }
}

/// Observer notified of every outcome a backend records.
///
/// Injected by the caller (e.g. to persist outcomes); the core never
/// performs I/O on its own. Implementations must not block.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, record: &OutcomeRecord);
}

/// Append-only, thread-safe outcome history for one backend.
///
/// The lock is only held for the duration of a push or a summary
/// computation, never across a network call.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    records: Mutex<Vec<OutcomeRecord>>,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record. Concurrent writers never lose records.
    pub fn append(&self, record: OutcomeRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    pub fn summary(&self) -> MetricsSummary {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        MetricsSummary::from_records(&records)
    }

    /// Snapshot of the full history in append order.
    pub fn records(&self) -> Vec<OutcomeRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_summary_is_all_zero() {
        let tracker = MetricsTracker::new();
        let summary = tracker.summary();

        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.avg_latency, 0.0);
        assert_eq!(summary.total_tokens, 0);
        assert_eq!(summary.request_count, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(!summary.success_rate.is_nan());
    }

    #[test]
    fn test_summary_aggregates() {
        let tracker = MetricsTracker::new();
        tracker.append(OutcomeRecord::success(
            "alpha",
            "m",
            Duration::from_millis(1000),
            100,
            0.5,
        ));
        tracker.append(OutcomeRecord::success(
            "alpha",
            "m",
            Duration::from_millis(3000),
            300,
            1.5,
        ));
        tracker.append(OutcomeRecord::failure(
            "alpha",
            "m",
            Duration::from_millis(2000),
            "vendor returned 503: busy",
        ));

        let summary = tracker.summary();
        assert_eq!(summary.request_count, 3);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.total_tokens, 400);
        assert!((summary.total_cost - 2.0).abs() < 1e-12);
        assert!((summary.avg_latency - 2.0).abs() < 1e-12);
        assert!((summary.success_rate - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_failure_record_has_zero_tokens_and_cost() {
        let record = OutcomeRecord::failure("beta", "m", Duration::from_millis(250), "boom");
        assert!(!record.success);
        assert_eq!(record.tokens, 0);
        assert_eq!(record.cost, 0.0);
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert!((record.latency_secs - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let tracker = Arc::new(MetricsTracker::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        tracker.append(OutcomeRecord::success(
                            "alpha",
                            "m",
                            Duration::ZERO,
                            1,
                            0.0,
                        ));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.len(), 2000);
        assert_eq!(tracker.summary().total_tokens, 2000);
    }
}
