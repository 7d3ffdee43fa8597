//! Execution primitives shared by every provisioning stage: bounded retry
//! and a fan-out executor for per-node work.

mod executor;
pub mod retry;

pub use executor::{TaskExecutor, TaskResult, TaskResults};
pub use retry::{retry, RetryPolicy};
