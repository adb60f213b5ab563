//! Evidence retrieval for a single topic.
//!
//! Only posts from comparable channels are considered. Hard keyword filters
//! run before scoring, candidates are ranked by a semantic + lexical blend,
//! and a per-channel cap keeps one prolific channel from filling the set.

use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{MustHaveMode, RankingConfig};
use crate::models::{Category, IndexedPost};
use crate::similarity::{
    clean_keywords, contains_all, contains_any, cosine_similarity, keyword_tokens, lexical_score,
};

#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Explicit lexical anchors; derived from the topic text when `None`.
    pub topic_keywords: Option<Vec<String>>,
    pub must_have_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub channel_cap: Option<usize>,
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ReferenceCandidate<'a> {
    pub post: &'a IndexedPost,
    pub corpus_index: usize,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub blended_score: f32,
    pub eligible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceSelector {
    cfg: RankingConfig,
}

impl ReferenceSelector {
    pub fn new(cfg: RankingConfig) -> Self {
        Self { cfg }
    }

    /// Scores every comparable-channel post. `post_embeddings[i]` belongs to `posts[i]`;
    /// a missing vector scores 0 semantically.
    pub fn score<'a>(
        &self,
        topic: &str,
        topic_embedding: &[f32],
        posts: &'a [IndexedPost],
        post_embeddings: &[Vec<f32>],
        opts: &SelectOptions,
    ) -> Vec<ReferenceCandidate<'a>> {
        let (keywords, lexical_weight) = match &opts.topic_keywords {
            Some(kws) if !kws.is_empty() => (clean_keywords(kws), self.cfg.explicit_lexical_weight),
            _ => (keyword_tokens(topic), self.cfg.lexical_weight),
        };
        let must_have = clean_keywords(&opts.must_have_keywords);
        let exclude = clean_keywords(&opts.exclude_keywords);
        let mode = self.cfg.must_have_mode;

        posts
            .par_iter()
            .enumerate()
            .filter(|(_, p)| p.category == Category::Similar)
            .map(|(i, post)| {
                let text = post.text.to_lowercase();

                let excluded = !exclude.is_empty() && contains_any(&text, &exclude);
                let has_required = must_have.is_empty()
                    || match mode {
                        MustHaveMode::Any => contains_any(&text, &must_have),
                        MustHaveMode::All => contains_all(&text, &must_have),
                    };

                let semantic = post_embeddings
                    .get(i)
                    .map(|v| cosine_similarity(topic_embedding, v))
                    .unwrap_or(0.0);
                let lexical = lexical_score(&text, &keywords);

                ReferenceCandidate {
                    post,
                    corpus_index: i,
                    semantic_score: semantic,
                    lexical_score: lexical,
                    blended_score: self.cfg.semantic_weight * semantic + lexical_weight * lexical,
                    eligible: !excluded && has_required,
                }
            })
            .collect()
    }

    /// Ranked, filtered, channel-diverse evidence for `topic`.
    pub fn select<'a>(
        &self,
        topic: &str,
        topic_embedding: &[f32],
        posts: &'a [IndexedPost],
        post_embeddings: &[Vec<f32>],
        opts: &SelectOptions,
    ) -> Vec<&'a IndexedPost> {
        if posts.is_empty() {
            return Vec::new();
        }
        let cap = opts.channel_cap.unwrap_or(self.cfg.channel_cap).max(1);
        let top_k = opts.top_k.unwrap_or(self.cfg.top_k);

        let mut ranked: Vec<ReferenceCandidate<'a>> = self
            .score(topic, topic_embedding, posts, post_embeddings, opts)
            .into_iter()
            .filter(|c| c.eligible)
            .collect();
        let eligible = ranked.len();
        // collected in corpus order, so the stable sort breaks ties by position
        ranked.sort_by(|a, b| b.blended_score.total_cmp(&a.blended_score));

        let mut per_channel: HashMap<&str, usize> = HashMap::new();
        let mut admitted = Vec::with_capacity(top_k);
        for c in ranked {
            if admitted.len() >= top_k {
                break;
            }
            let used = per_channel.entry(c.post.channel.as_str()).or_insert(0);
            if *used >= cap {
                continue;
            }
            *used += 1;
            admitted.push(c.post);
        }

        debug!(
            "References selected - topic={:?}, eligible={}, admitted={}, channel_cap={}",
            topic,
            eligible,
            admitted.len(),
            cap
        );
        admitted
    }
}
