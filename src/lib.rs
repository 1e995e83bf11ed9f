//! switchboard - score-based routing and fallback across LLM inference backends
//!
//! This library provides backend adapters, per-backend outcome metrics,
//! the cost model, the backend registry, the scoring selector and the
//! execution core (fallback and retry), plus an optional HTTP API and
//! SQLite outcome log.

pub mod api;
pub mod backend;
pub mod config;
pub mod cost;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::Registry;
pub use router::{ExecutionResult, Executor, TaskRequest};
