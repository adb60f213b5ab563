use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Own,
    Similar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedPost {
    pub id: String,
    pub channel: String,
    pub category: Category,
    pub published_at: String, // raw; may be unparsable
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
}

impl IndexedPost {
    /// Accepts RFC3339 or a bare `YYYY-MM-DD`; anything else is `None`.
    pub fn published_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_at.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn reactions(&self) -> f64 {
        self.metrics
            .as_ref()
            .and_then(|m| m.get("reactions"))
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    #[default]
    Engagement,
    Storytelling,
    Promotion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Inspiring,
    #[default]
    Casual,
    Adventure,
}

impl Objective {
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "engagement" => Some(Objective::Engagement),
            "storytelling" => Some(Objective::Storytelling),
            "promotion" => Some(Objective::Promotion),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Objective::Engagement => "engagement",
            Objective::Storytelling => "storytelling",
            Objective::Promotion => "promotion",
        }
    }
}

impl Tone {
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inspiring" => Some(Tone::Inspiring),
            "casual" => Some(Tone::Casual),
            "adventure" => Some(Tone::Adventure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Inspiring => "inspiring",
            Tone::Casual => "casual",
            Tone::Adventure => "adventure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub rank: usize,
    pub topic: String,
    pub objective: Objective,
    pub tone: Tone,
    pub cta: String,
    pub source_post_ids: Vec<String>,
    pub week_index: usize,
    pub week_start: String, // YYYY-MM-DD, inclusive
    pub week_end: String,   // YYYY-MM-DD, inclusive
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQueue {
    pub queue_id: String,
    pub created_at: DateTime<Utc>,
    pub mode: String,
    pub total_posts: usize,
    pub queue: Vec<QueueItem>,
}

/// Result of a generation run, with the raw seeds kept for debugging.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub topic_seeds: Vec<String>,
    pub stored: StoredQueue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub rank: usize,
    pub topic: String,
    pub text: String,
    pub source_post_ids: Vec<String>,
}
