//! Client for the external run-tracking service.
//!
//! [`RunsClient`] speaks the raw `/v1/runs` contract. The policy layer in
//! [`policy`] wraps it with an explicit [`TrackingPolicy`] per call site:
//! mandatory callers propagate tracking failures, best-effort callers log them
//! and continue untracked.

pub mod client;
pub mod error;
pub mod policy;
pub mod types;

pub use client::RunsClient;
pub use error::RunsError;
pub use policy::TrackingPolicy;
pub use types::{CostItem, CreateRunParams, Run, RunOwner, RunStatus};
