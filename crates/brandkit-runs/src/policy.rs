//! Failure policy for run tracking.
//!
//! Tracking calls are the same for every caller; what differs is whether a
//! failure aborts the caller. The policy is chosen per call site.

use serde::{Deserialize, Serialize};

use crate::client::RunsClient;
use crate::error::RunsError;
use crate::types::{CostItem, CreateRunParams, Run, RunStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPolicy {
    /// Tracking failures abort the operation.
    #[default]
    Mandatory,
    /// Tracking failures are logged; the operation continues untracked.
    BestEffort,
}

impl TrackingPolicy {
    /// Apply the policy to a tracking result: propagate or log-and-drop.
    fn settle<T>(self, result: Result<T, RunsError>, action: &str) -> Result<Option<T>, RunsError> {
        match (result, self) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), TrackingPolicy::Mandatory) => Err(e),
            (Err(e), TrackingPolicy::BestEffort) => {
                tracing::warn!(error = %e, action, "best-effort run tracking failed; continuing");
                Ok(None)
            }
        }
    }
}

impl RunsClient {
    /// Create a run under `policy`. `Ok(None)` means best-effort tracking is
    /// unavailable and the caller proceeds untracked.
    ///
    /// # Errors
    ///
    /// Under [`TrackingPolicy::Mandatory`], any [`RunsError`] from the tracker.
    pub async fn start_run(
        &self,
        params: &CreateRunParams,
        policy: TrackingPolicy,
    ) -> Result<Option<Run>, RunsError> {
        let run = policy.settle(self.create_run(params).await, "create run")?;
        if let Some(run) = &run {
            tracing::info!(run_id = %run.id, task_name = %params.task_name, "run started");
        }
        Ok(run)
    }

    /// Attach cost items to a run. A missing run id is an untracked run and
    /// sends nothing.
    ///
    /// # Errors
    ///
    /// Under [`TrackingPolicy::Mandatory`], any [`RunsError`] from the tracker.
    pub async fn record_costs(
        &self,
        run_id: Option<&str>,
        items: &[CostItem],
        policy: TrackingPolicy,
    ) -> Result<(), RunsError> {
        let Some(run_id) = run_id else {
            tracing::debug!(items = items.len(), "untracked run; skipping cost items");
            return Ok(());
        };
        if items.is_empty() {
            return Ok(());
        }
        policy.settle(self.add_costs(run_id, items).await, "add costs")?;
        Ok(())
    }

    /// Mark a run `completed`.
    ///
    /// # Errors
    ///
    /// Under [`TrackingPolicy::Mandatory`], any [`RunsError`] from the tracker.
    pub async fn complete_run(
        &self,
        run_id: Option<&str>,
        policy: TrackingPolicy,
    ) -> Result<(), RunsError> {
        let Some(run_id) = run_id else {
            return Ok(());
        };
        if policy
            .settle(self.update_run(run_id, RunStatus::Completed).await, "complete run")?
            .is_some()
        {
            tracing::info!(run_id, "run completed");
        }
        Ok(())
    }

    /// Mark a run `failed`. Never returns an error: this runs while another
    /// error is already propagating, and that error takes priority.
    pub async fn fail_run_best_effort(&self, run_id: Option<&str>) {
        let Some(run_id) = run_id else {
            return;
        };
        match self.update_run(run_id, RunStatus::Failed).await {
            Ok(_) => tracing::info!(run_id, "run marked failed"),
            Err(e) => tracing::error!(run_id, error = %e, "could not mark run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_err() -> RunsError {
        RunsError::Status {
            status: 503,
            body: "down".to_string(),
        }
    }

    #[test]
    fn mandatory_propagates() {
        let result = TrackingPolicy::Mandatory.settle::<()>(Err(status_err()), "test");
        assert!(matches!(result, Err(RunsError::Status { status: 503, .. })));
    }

    #[test]
    fn best_effort_swallows() {
        let result = TrackingPolicy::BestEffort.settle::<()>(Err(status_err()), "test");
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn success_passes_through_either_policy() {
        assert!(matches!(
            TrackingPolicy::Mandatory.settle(Ok(7), "test"),
            Ok(Some(7))
        ));
        assert!(matches!(
            TrackingPolicy::BestEffort.settle(Ok(7), "test"),
            Ok(Some(7))
        ));
    }

    #[test]
    fn policy_deserializes_from_snake_case() {
        let policy: TrackingPolicy = serde_json::from_str("\"best_effort\"").unwrap();
        assert_eq!(policy, TrackingPolicy::BestEffort);
        assert_eq!(TrackingPolicy::default(), TrackingPolicy::Mandatory);
    }
}
