use serde::{Deserialize, Serialize};

/// Locally stored candidate identity; there is no authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub candidate_name: String,
    #[serde(default)]
    pub candidate_image: Option<String>,
}
