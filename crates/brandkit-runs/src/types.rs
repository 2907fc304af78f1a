use serde::{Deserialize, Serialize};

/// Which tenant identifier a run is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOwner {
    /// Internal organization id, sent as `organizationId`.
    Organization(String),
    /// Identity-provider organization id, sent as `clerkOrgId`.
    ClerkOrg(String),
}

/// Caller-supplied fields for `POST /v1/runs`. `appId` and `serviceName`
/// come from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRunParams {
    pub owner: RunOwner,
    pub brand_id: Option<String>,
    pub task_name: String,
    pub parent_run_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRunBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clerk_org_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<&'a str>,
    pub app_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<&'a str>,
    pub service_name: &'a str,
    pub task_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<&'a str>,
}

impl<'a> CreateRunBody<'a> {
    pub(crate) fn new(params: &'a CreateRunParams, app_id: &'a str, service_name: &'a str) -> Self {
        let (clerk_org_id, organization_id) = match &params.owner {
            RunOwner::ClerkOrg(id) => (Some(id.as_str()), None),
            RunOwner::Organization(id) => (None, Some(id.as_str())),
        };
        Self {
            clerk_org_id,
            organization_id,
            app_id,
            brand_id: params.brand_id.as_deref(),
            service_name,
            task_name: &params.task_name,
            parent_run_id: params.parent_run_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    /// Any status this client does not act on.
    #[serde(other)]
    Other,
}

/// A run as returned by the tracking service. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
}

/// One billable line attached to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostItem {
    pub cost_name: String,
    pub quantity: u64,
}

impl CostItem {
    pub fn new(cost_name: impl Into<String>, quantity: u64) -> Self {
        Self {
            cost_name: cost_name.into(),
            quantity,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRunBody {
    pub status: RunStatus,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddCostsBody<'a> {
    pub items: &'a [CostItem],
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddCostsResponse {
    #[serde(default)]
    pub costs: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clerk_owner_is_sent_as_clerk_org_id() {
        let params = CreateRunParams {
            owner: RunOwner::ClerkOrg("org_2abc".to_string()),
            brand_id: Some("b-1".to_string()),
            task_name: "extract-sales-profile".to_string(),
            parent_run_id: None,
        };
        let body = serde_json::to_value(CreateRunBody::new(&params, "app", "svc")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "clerkOrgId": "org_2abc",
                "appId": "app",
                "brandId": "b-1",
                "serviceName": "svc",
                "taskName": "extract-sales-profile"
            })
        );
    }

    #[test]
    fn organization_owner_is_sent_as_organization_id() {
        let params = CreateRunParams {
            owner: RunOwner::Organization("o-1".to_string()),
            brand_id: None,
            task_name: "suggest-icp".to_string(),
            parent_run_id: Some("parent".to_string()),
        };
        let body = serde_json::to_value(CreateRunBody::new(&params, "app", "svc")).unwrap();
        assert_eq!(body["organizationId"], "o-1");
        assert_eq!(body["parentRunId"], "parent");
        assert!(body.get("clerkOrgId").is_none());
        assert!(body.get("brandId").is_none());
    }

    #[test]
    fn unknown_run_status_is_tolerated() {
        let run: Run = serde_json::from_str(r#"{"id":"r1","status":"queued","extra":1}"#).unwrap();
        assert_eq!(run.status, RunStatus::Other);
    }
}
