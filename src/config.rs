use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{Objective, Tone};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub seeds: SeedConfig,
    pub ranking: RankingConfig,
    pub queue: QueueConfig,
    pub embeddings: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub topic_count: usize,
    pub candidate_pool: usize,
    pub evidence_size: usize,
    pub recency_weight: f64,
    pub engagement_weight: f64,
    pub recency_window_days: f64,
    pub evidence_chars: usize, // per-post excerpt length in prompts
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            topic_count: 10,
            candidate_pool: 1200,
            evidence_size: 120,
            recency_weight: 0.55,
            engagement_weight: 0.45,
            recency_window_days: 730.0,
            evidence_chars: 280,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MustHaveMode {
    #[default]
    Any,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_k: usize,
    pub channel_cap: usize,
    pub semantic_weight: f32,
    pub lexical_weight: f32,          // keywords derived from the topic
    pub explicit_lexical_weight: f32, // caller-supplied topic keywords
    pub must_have_mode: MustHaveMode,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            channel_cap: 2,
            semantic_weight: 1.0,
            lexical_weight: 0.15,
            explicit_lexical_weight: 0.35,
            must_have_mode: MustHaveMode::Any,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub timezone: String,
    pub max_items: usize,
    pub default_objective: Objective,
    pub default_tone: Tone,
    pub default_cta: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            max_items: 20,
            default_objective: Objective::Engagement,
            default_tone: Tone::Casual,
            default_cta: "Tell us what you think in the comments".into(),
        }
    }
}

impl QueueConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("invalid queue.timezone {:?}: {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".into(),
            batch_size: 64,
            max_concurrent_batches: 4,
            timeout_secs: 30,
        }
    }
}

pub fn load_planner_config(path: Option<&Path>) -> Result<PlannerConfig> {
    let Some(path) = path else {
        return Ok(PlannerConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading planner config {}", path.display()))?;
    let cfg: PlannerConfig = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing planner config {}", path.display()))?;
    cfg.queue.tz()?;
    if cfg.seeds.topic_count == 0 || cfg.ranking.channel_cap == 0 || cfg.embeddings.batch_size == 0 {
        anyhow::bail!("planner config: topic_count, channel_cap and batch_size must be positive");
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_means_defaults() {
        let cfg = load_planner_config(None).unwrap();
        assert_eq!(cfg.seeds.topic_count, 10);
        assert_eq!(cfg.ranking.channel_cap, 2);
        assert_eq!(cfg.ranking.must_have_mode, MustHaveMode::Any);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "ranking:\n  must_have_mode: all\n  top_k: 3\nqueue:\n  timezone: Europe/Berlin").unwrap();
        let cfg = load_planner_config(Some(f.path())).unwrap();
        assert_eq!(cfg.ranking.must_have_mode, MustHaveMode::All);
        assert_eq!(cfg.ranking.top_k, 3);
        assert_eq!(cfg.ranking.channel_cap, 2);
        assert_eq!(cfg.queue.tz().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "queue:\n  timezone: Mars/Olympus").unwrap();
        assert!(load_planner_config(Some(f.path())).is_err());
    }
}
