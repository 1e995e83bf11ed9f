//! Backend selection and request execution.
//!
//! - [`Selector`] scores backends from their metrics and picks one
//! - [`Executor::execute_with_fallback`] runs a request, falling back across backends
//! - [`Executor::execute_with_retry`] repeats that until it succeeds or the budget runs out

mod fallback;
mod retry;
mod selector;
mod types;

pub use fallback::Executor;
pub use retry::RetryPolicy;
pub use selector::{
    score, Criteria, Criterion, ScoreBreakdown, Selector, COST_WEIGHT, QUALITY_WEIGHT,
    SPEED_WEIGHT,
};
pub use types::{ExecutionResult, Operation, Output, TaskRequest};
