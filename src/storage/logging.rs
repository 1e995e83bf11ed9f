//! Outcome rows and the sink that writes them.

use sqlx::SqlitePool;

use crate::metrics::{OutcomeRecord, OutcomeSink};

/// One outcome ready for database insertion.
///
/// All fields are owned types to satisfy `tokio::spawn` `'static` requirement.
#[derive(Debug, Clone)]
pub struct OutcomeLog {
    pub timestamp: String,
    pub backend: String,
    pub model: String,
    pub latency_secs: f64,
    pub tokens: u32,
    pub cost: f64,
    pub success: bool,
    pub error_message: Option<String>,
}

impl From<&OutcomeRecord> for OutcomeLog {
    fn from(record: &OutcomeRecord) -> Self {
        Self {
            timestamp: record.timestamp.to_rfc3339(),
            backend: record.backend.clone(),
            model: record.model.clone(),
            latency_secs: record.latency_secs,
            tokens: record.tokens,
            cost: record.cost,
            success: record.success,
            error_message: record.error.clone(),
        }
    }
}

impl OutcomeLog {
    /// Insert this outcome into the database.
    pub async fn insert(&self, pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO outcomes (
                timestamp, backend, model, latency_secs,
                tokens, cost, success, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.timestamp)
        .bind(&self.backend)
        .bind(&self.model)
        .bind(self.latency_secs)
        .bind(i64::from(self.tokens))
        .bind(self.cost)
        .bind(self.success)
        .bind(self.error_message.as_deref())
        .execute(pool)
        .await?;
        Ok(())
    }
}

/// Spawn a fire-and-forget database write.
///
/// If the write fails, a warning is logged but the error is not propagated.
/// Outside a Tokio runtime the outcome is dropped with a warning.
pub fn spawn_log_write(pool: &SqlitePool, log: OutcomeLog) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(backend = %log.backend, "No runtime available, outcome not persisted");
        return;
    };

    let pool = pool.clone();
    handle.spawn(async move {
        if let Err(e) = log.insert(&pool).await {
            tracing::warn!(
                backend = %log.backend,
                error = %e,
                "Failed to write outcome to database"
            );
        }
    });
}

/// Persists every recorded outcome to SQLite without blocking the caller.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl OutcomeSink for SqliteSink {
    fn record(&self, record: &OutcomeRecord) {
        spawn_log_write(&self.pool, OutcomeLog::from(record));
    }
}
