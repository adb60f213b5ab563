use serde::{Deserialize, Serialize};

/* Plan item */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanItemResponse {
    #[serde(default)]
    pub objective: String, // engagement|storytelling|promotion
    #[serde(default)]
    pub tone: String, // inspiring|casual|adventure
    #[serde(default)]
    pub cta: String,
}

/* Draft */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftResponse {
    pub text: String,
}

/// Compact view of a reference post embedded in prompts.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceLine {
    pub channel: String,
    pub text: String,
    pub reactions: u64,
}
