use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    /// Attempt id.
    pub id: String,
    pub candidate_name: String,
    pub test: TestRef,
    #[serde(default, alias = "resumeRequestedAt")]
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}
