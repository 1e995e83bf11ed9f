//! HTTP API over the execution core.
//!
//! A thin caller: handlers validate and translate, the [`Executor`](crate::router::Executor)
//! does the work.

mod handlers;
mod server;

pub use handlers::{ExecuteRequest, BACKEND_HEADER, FALLBACK_HEADER, REQUEST_ID_HEADER};
pub use server::{build_executor, create_router, run_server, AppState, RequestId};
