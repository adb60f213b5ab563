use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::budget::{assert_prompt_budget, excerpt, PROMPT_TOKEN_CAP};
use crate::compress::GenerativeProvider;
use crate::config::SeedConfig;
use crate::error::{PlannerError, PlannerResult};
use crate::models::IndexedPost;
use crate::out_models::EvidenceLine;
use crate::parse::extract_list;
use crate::prompts::user_topic_seeds;
use crate::similarity::normalize_topic;

#[derive(Debug, Clone)]
pub struct SeedCandidate<'a> {
    pub post: &'a IndexedPost,
    pub recency: f64,
    pub engagement: f64,
    pub score: f64,
}

/// Linear decay over the window; unparsable dates score 0.
pub fn recency_score(post: &IndexedPost, now: DateTime<Utc>, window_days: f64) -> f64 {
    let Some(published) = post.published_at_utc() else {
        return 0.0;
    };
    let age_days = (now - published).num_seconds() as f64 / 86_400.0;
    (1.0 - age_days / window_days).clamp(0.0, 1.0)
}

/// Scores the capped candidate pool and keeps the best `evidence_size`, ties in corpus order.
pub fn rank_seed_candidates<'a>(
    posts: &'a [IndexedPost],
    cfg: &SeedConfig,
    now: DateTime<Utc>,
) -> Vec<SeedCandidate<'a>> {
    let pool: Vec<&IndexedPost> = posts
        .iter()
        .take(cfg.candidate_pool)
        .filter(|p| !p.text.trim().is_empty())
        .collect();

    let max_reactions = pool.iter().map(|p| p.reactions()).fold(0.0f64, f64::max);
    let denom = max_reactions.ln_1p();

    let mut scored: Vec<SeedCandidate<'a>> = pool
        .into_iter()
        .map(|post| {
            let recency = recency_score(post, now, cfg.recency_window_days);
            let engagement = if denom > 0.0 { post.reactions().ln_1p() / denom } else { 0.0 };
            SeedCandidate {
                post,
                recency,
                engagement,
                score: cfg.recency_weight * recency + cfg.engagement_weight * engagement,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(cfg.evidence_size);
    scored
}

/// Parses the model's list, dedupes on normalized form, and insists on exactly `count` topics.
pub fn parse_topic_seeds(raw: &str, count: usize) -> PlannerResult<Vec<String>> {
    let items: Vec<Value> = extract_list(raw)
        .into_result()
        .map_err(PlannerError::InvalidTopicSeeds)?;

    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    for item in items {
        let text = match &item {
            Value::String(s) => s.trim().to_string(),
            Value::Object(o) => o
                .get("topic")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        if text.is_empty() {
            continue;
        }
        if seen.insert(normalize_topic(&text)) {
            topics.push(text);
        }
    }

    if topics.len() != count {
        return Err(PlannerError::InvalidTopicSeeds(format!(
            "expected {} distinct topics, got {}",
            count,
            topics.len()
        )));
    }
    Ok(topics)
}

pub struct TopicSeedGenerator {
    provider: Arc<dyn GenerativeProvider>,
    cfg: SeedConfig,
}

impl TopicSeedGenerator {
    pub fn new(provider: Arc<dyn GenerativeProvider>, cfg: SeedConfig) -> Self {
        Self { provider, cfg }
    }

    pub fn topic_count(&self) -> usize {
        self.cfg.topic_count
    }

    /// One provider call, no retries.
    pub async fn generate(
        &self,
        posts: &[IndexedPost],
        avoid_topics: &[String],
        now: DateTime<Utc>,
    ) -> PlannerResult<Vec<String>> {
        let start = std::time::Instant::now();
        let candidates = rank_seed_candidates(posts, &self.cfg, now);
        if candidates.is_empty() {
            warn!("No seed candidates - corpus={} posts", posts.len());
            return Err(PlannerError::SeedCandidatesEmpty);
        }
        debug!(
            "Seed evidence selected - pool_cap={}, kept={}, top_score={:.3}",
            self.cfg.candidate_pool,
            candidates.len(),
            candidates[0].score
        );

        let evidence: Vec<EvidenceLine> = candidates
            .iter()
            .map(|c| EvidenceLine {
                channel: c.post.channel.clone(),
                text: excerpt(&c.post.text, self.cfg.evidence_chars),
                reactions: c.post.reactions() as u64,
            })
            .collect();
        let evidence_json = serde_json::to_string(&evidence)?;
        let avoid_json = serde_json::to_string(avoid_topics)?;
        let prompt = user_topic_seeds(self.cfg.topic_count, &evidence_json, &avoid_json);
        assert_prompt_budget(&prompt, PROMPT_TOKEN_CAP)?;

        let raw = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| PlannerError::Provider(e.to_string()))?;
        let topics = parse_topic_seeds(&raw, self.cfg.topic_count)?;

        info!(
            "Topic seeds generated - duration={:.2}s, topics={}",
            start.elapsed().as_secs_f32(),
            topics.len()
        );
        Ok(topics)
    }
}
