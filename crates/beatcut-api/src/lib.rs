//! Read-only HTTP status API.
//!
//! Exposes the task list, single tasks and output artifacts over HTTP.
//! The API never mutates the task store; all writes belong to the
//! pipeline workers.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, TaskEntry};
