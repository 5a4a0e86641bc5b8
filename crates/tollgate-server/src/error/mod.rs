//! Error handling for the Tollgate API server.
//!
//! Handlers and middleware return [`ApiError`]; its `IntoResponse`
//! implementation is the single place where errors become HTTP responses.

pub mod context;
pub mod response;
pub mod types;

pub use context::not_found;
pub use types::{ApiError, ApiResult};
