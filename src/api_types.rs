use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One record of a normalized history export, as written by the indexing step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPost {
    #[serde(default)]
    pub id: Option<String>,
    pub channel: String,
    #[serde(default, alias = "date")]
    pub published_at: String, // RFC3339 or YYYY-MM-DD; left raw
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metrics: Option<BTreeMap<String, f64>>,
}
