pub mod client;
pub mod errors;
pub mod retry;
pub mod types;

pub use client::{HttpWorkflowApi, WorkflowApi};
pub use errors::{ApiError, ErrorCategory};
pub use retry::RetryConfig;
