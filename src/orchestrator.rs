use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::composer::PlanComposer;
use crate::compress::GenerativeProvider;
use crate::config::PlannerConfig;
use crate::corpus::posts_by_ids;
use crate::embeddings::{BatchedEmbedder, EmbeddingProvider};
use crate::error::{PlannerError, PlannerResult};
use crate::models::{Category, GenerationOutcome, IndexedPost, PostDraft, StoredQueue};
use crate::queue::{assign_slots, new_queue_id, QueueStateMachine};
use crate::seeds::TopicSeedGenerator;
use crate::selector::{ReferenceSelector, SelectOptions};
use crate::similarity::normalize_topic;

pub struct Planner {
    posts: Vec<IndexedPost>,
    seeds: TopicSeedGenerator,
    selector: ReferenceSelector,
    composer: PlanComposer,
    embedder: BatchedEmbedder,
    state: Arc<QueueStateMachine>,
    select_opts: SelectOptions,
}

impl Planner {
    pub fn new(
        posts: Vec<IndexedPost>,
        cfg: &PlannerConfig,
        generator: Arc<dyn GenerativeProvider>,
        embeddings: Arc<dyn EmbeddingProvider>,
        state: Arc<QueueStateMachine>,
    ) -> Self {
        Self {
            posts,
            seeds: TopicSeedGenerator::new(generator.clone(), cfg.seeds.clone()),
            selector: ReferenceSelector::new(cfg.ranking.clone()),
            composer: PlanComposer::new(generator, cfg.queue.clone(), cfg.seeds.evidence_chars),
            embedder: BatchedEmbedder::new(embeddings, &cfg.embeddings),
            state,
            select_opts: SelectOptions::default(),
        }
    }

    /// Hard filters applied to every topic's evidence.
    pub fn with_select_options(mut self, opts: SelectOptions) -> Self {
        self.select_opts = opts;
        self
    }

    pub fn state(&self) -> &QueueStateMachine {
        &self.state
    }

    /// Topics of the persisted queue, or nothing if none exists.
    pub async fn current_topics(&self) -> Vec<String> {
        match self.state.load().await {
            Ok(q) => q.queue.into_iter().map(|i| i.topic).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn generate_and_save(&self, avoid_topics: &[String]) -> PlannerResult<GenerationOutcome> {
        let outcome = self.build_queue(avoid_topics).await?;
        self.state.commit(&outcome.stored).await?;
        Ok(outcome)
    }

    /// Same pipeline, nothing persisted.
    pub async fn suggest(&self, avoid_topics: &[String]) -> PlannerResult<GenerationOutcome> {
        self.build_queue(avoid_topics).await
    }

    async fn build_queue(&self, avoid_topics: &[String]) -> PlannerResult<GenerationOutcome> {
        let pipeline_start = std::time::Instant::now();
        if self.posts.is_empty() {
            return Err(PlannerError::EmptyPosts);
        }
        let now = self.state.now();
        let required = self.seeds.topic_count();
        info!("Queue generation started - posts={}, avoid={}", self.posts.len(), avoid_topics.len());

        // 1) seeds
        let topic_seeds = self
            .seeds
            .generate(&self.posts, avoid_topics, now)
            .await
            .map_err(PlannerError::into_generation_failure)?;

        // 2) avoidance
        let avoid: HashSet<String> = avoid_topics.iter().map(|t| normalize_topic(t)).collect();
        let topics: Vec<String> = topic_seeds
            .iter()
            .filter(|t| !avoid.contains(&normalize_topic(t)))
            .cloned()
            .collect();
        if topics.len() < required {
            warn!("Avoidance left {}/{} topics - seeds={:?}", topics.len(), required, topic_seeds);
            return Err(PlannerError::InsufficientUniqueTopics { required, available: topics.len() });
        }

        // 3) embeddings; own posts are never candidates so they get no vector
        let embed_start = std::time::Instant::now();
        let similar_texts: Vec<String> = self
            .posts
            .iter()
            .filter(|p| p.category == Category::Similar)
            .map(|p| p.text.clone())
            .collect();
        let similar_vectors = self
            .embedder
            .embed_all(&similar_texts)
            .await
            .map_err(PlannerError::into_generation_failure)?;
        let mut similar_iter = similar_vectors.into_iter();
        let post_embeddings: Vec<Vec<f32>> = self
            .posts
            .iter()
            .map(|p| match p.category {
                Category::Similar => similar_iter.next().unwrap_or_default(),
                Category::Own => Vec::new(),
            })
            .collect();
        let topic_embeddings = self
            .embedder
            .embed_all(&topics)
            .await
            .map_err(PlannerError::into_generation_failure)?;
        debug!("Embeddings ready - duration={:.2}s, similar_posts={}", embed_start.elapsed().as_secs_f32(), similar_texts.len());

        // 4) evidence per topic
        let references: Vec<Vec<&IndexedPost>> = topics
            .iter()
            .zip(&topic_embeddings)
            .map(|(topic, emb)| self.selector.select(topic, emb, &self.posts, &post_embeddings, &self.select_opts))
            .collect();

        // 5) compose all items in parallel
        let compose_start = std::time::Instant::now();
        let tasks = topics
            .iter()
            .zip(&references)
            .map(|(topic, refs)| self.composer.compose(topic, refs));
        let mut items = futures::future::join_all(tasks)
            .await
            .into_iter()
            .collect::<PlannerResult<Vec<_>>>()
            .map_err(PlannerError::into_generation_failure)?;
        info!("Plan items composed - duration={:.2}s, items={}", compose_start.elapsed().as_secs_f32(), items.len());

        // 6) slots
        assign_slots(&mut items, self.state.anchor_at(now));

        let stored = StoredQueue {
            queue_id: new_queue_id(now),
            created_at: now,
            mode: "rag".into(),
            total_posts: self.posts.len(),
            queue: items,
        };
        info!(
            "Queue generation completed - total_duration={:.2}s, queue_id={}, items={}",
            pipeline_start.elapsed().as_secs_f32(),
            stored.queue_id,
            stored.queue.len()
        );
        Ok(GenerationOutcome { topic_seeds, stored })
    }

    /// Draft the post for a 1-based queue position from its stored evidence.
    pub async fn draft(&self, rank: usize) -> PlannerResult<PostDraft> {
        let stored = self.state.load().await?;
        let item = stored
            .queue
            .iter()
            .find(|i| i.rank == rank)
            .ok_or(PlannerError::OutOfRange { index: rank, len: stored.queue.len() })?;
        let refs = posts_by_ids(&self.posts, &item.source_post_ids);
        if refs.len() < item.source_post_ids.len() {
            warn!("Draft evidence incomplete - rank={}, found={}/{}", rank, refs.len(), item.source_post_ids.len());
        }
        let text = self.composer.draft(item, &refs).await?;
        Ok(PostDraft {
            rank,
            topic: item.topic.clone(),
            text,
            source_post_ids: item.source_post_ids.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embeddings::tests::LetterEmbeddings;
    use crate::queue::Clock;
    use crate::store::FileQueueRepository;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replies in order and records every prompt.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(replies: Vec<String>) -> Self {
            Self { replies: Mutex::new(replies.into()), prompts: Mutex::new(Vec::new()) }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait(?Send)]
    impl GenerativeProvider for ScriptedProvider {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }
    }

    /// Routes by prompt kind: seed lists in order, a fixed plan item, a fixed draft.
    struct FakeModel {
        seed_replies: Mutex<VecDeque<String>>,
    }

    #[async_trait(?Send)]
    impl GenerativeProvider for FakeModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            if prompt.contains("Propose exactly") {
                return self
                    .seed_replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .ok_or_else(|| anyhow::anyhow!("no seed reply"));
            }
            if prompt.contains("Plan one upcoming post") {
                return Ok(r#"{"objective":"storytelling","tone":"inspiring","cta":"Tell us your story"}"#.into());
            }
            Ok(r#"{"text":"A drafted post."}"#.into())
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn corpus() -> Vec<IndexedPost> {
        let mut posts = Vec::new();
        for (i, (channel, category, text)) in [
            ("me", Category::Own, "our own kayak story"),
            ("alpha", Category::Similar, "kayak touring along the coast"),
            ("alpha", Category::Similar, "kayak gear checklist"),
            ("alpha", Category::Similar, "kayak rolling practice"),
            ("beta", Category::Similar, "mountain hut food"),
            ("gamma", Category::Similar, "night sky photography"),
        ]
        .into_iter()
        .enumerate()
        {
            posts.push(IndexedPost {
                id: format!("p{}", i),
                channel: channel.into(),
                category,
                published_at: "2026-09-01".into(),
                text: text.into(),
                metrics: None,
            });
        }
        posts
    }

    fn seed_list(prefix: &str) -> String {
        let v: Vec<String> = (1..=10).map(|i| format!("{} kayak topic {}", prefix, i)).collect();
        serde_json::to_string(&v).unwrap()
    }

    fn planner(dir: &tempfile::TempDir, posts: Vec<IndexedPost>, seed_replies: Vec<String>) -> Planner {
        planner_with_clock(dir, posts, seed_replies, fixed_now)
    }

    fn planner_with_clock(
        dir: &tempfile::TempDir,
        posts: Vec<IndexedPost>,
        seed_replies: Vec<String>,
        clock: Clock,
    ) -> Planner {
        let repo = Arc::new(FileQueueRepository::new(dir.path().join("queue.json")));
        let cfg = PlannerConfig::default();
        let state = Arc::new(
            QueueStateMachine::new(repo, cfg.queue.clone()).unwrap().with_clock(clock),
        );
        let model = Arc::new(FakeModel { seed_replies: Mutex::new(seed_replies.into()) });
        Planner::new(posts, &cfg, model, Arc::new(LetterEmbeddings::new()), state)
    }

    #[tokio::test]
    async fn generate_persists_full_queue_with_outside_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, corpus(), vec![seed_list("First")]);

        let out = p.generate_and_save(&[]).await.unwrap();

        assert_eq!(out.topic_seeds.len(), 10);
        let q = p.state().load().await.unwrap();
        assert_eq!(q, out.stored);
        assert_eq!(q.queue.len(), 10);
        assert_eq!(q.mode, "rag");
        assert_eq!(q.total_posts, 6);
        assert_eq!(q.queue[0].week_start, "2026-10-19");
        assert_eq!(q.queue[9].week_end, "2026-12-27");
        for (i, item) in q.queue.iter().enumerate() {
            assert_eq!(item.rank, i + 1);
            assert_eq!(item.week_index, i + 1);
            assert!(!item.source_post_ids.contains(&"p0".to_string()));
            let alpha = item.source_post_ids.iter().filter(|id| ["p1", "p2", "p3"].contains(&id.as_str())).count();
            assert!(alpha <= 2);
        }
    }

    // first read is Monday 23:59:59; every later read is already Tuesday
    fn ticks_past_midnight() -> DateTime<Utc> {
        static READS: AtomicUsize = AtomicUsize::new(0);
        match READS.fetch_add(1, Ordering::SeqCst) {
            0 => Utc.with_ymd_and_hms(2026, 10, 19, 23, 59, 59).unwrap(),
            _ => Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn slots_anchor_to_the_same_instant_as_created_at() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner_with_clock(&dir, corpus(), vec![seed_list("First")], ticks_past_midnight);

        let out = p.generate_and_save(&[]).await.unwrap();

        assert_eq!(out.stored.created_at.date_naive().to_string(), "2026-10-19");
        assert!(out.stored.queue_id.starts_with("q_20261019T235959_"));
        assert_eq!(out.stored.queue[0].week_start, "2026-10-19");
    }

    #[tokio::test]
    async fn avoided_topics_never_reappear() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, corpus(), vec![seed_list("First"), seed_list("First"), seed_list("Second")]);

        let first = p.generate_and_save(&[]).await.unwrap();
        let avoid = p.current_topics().await;
        assert_eq!(avoid.len(), 10);

        // model repeats itself: fail loudly, keep the old queue
        let err = p.generate_and_save(&avoid).await.unwrap_err();
        assert_eq!(err.code(), "insufficient_unique_topics_after_avoidance");
        assert_eq!(p.state().load().await.unwrap(), first.stored);

        let second = p.generate_and_save(&avoid).await.unwrap();
        let old: HashSet<String> = avoid.iter().map(|t| normalize_topic(t)).collect();
        assert!(second.stored.queue.iter().all(|i| !old.contains(&normalize_topic(&i.topic))));
        assert_ne!(second.stored.queue_id, first.stored.queue_id);
    }

    #[tokio::test]
    async fn avoidance_is_case_and_whitespace_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, corpus(), vec![seed_list("First")]);
        let err = p.suggest(&["  FIRST   kayak topic 4 ".to_string()]).await.unwrap_err();
        assert_eq!(err.code(), "insufficient_unique_topics_after_avoidance");
    }

    #[tokio::test]
    async fn suggest_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, corpus(), vec![seed_list("First")]);

        let out = p.suggest(&[]).await.unwrap();

        assert_eq!(out.stored.queue.len(), 10);
        assert_eq!(p.state().load().await.unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn empty_corpus_and_bad_model_output() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, Vec::new(), vec![]);
        assert_eq!(p.generate_and_save(&[]).await.unwrap_err().code(), "empty_posts");

        let p = planner(&dir, corpus(), vec!["Sorry, here are some ideas: kayaks".into()]);
        let err = p.generate_and_save(&[]).await.unwrap_err();
        assert_eq!(err.code(), "rag_generation_failed");
        assert!(err.is_retryable());
        assert_eq!(p.state().load().await.unwrap_err().code(), "not_found");
    }

    #[tokio::test]
    async fn draft_uses_persisted_item() {
        let dir = tempfile::tempdir().unwrap();
        let p = planner(&dir, corpus(), vec![seed_list("First")]);
        assert_eq!(p.draft(1).await.unwrap_err().code(), "not_found");

        p.generate_and_save(&[]).await.unwrap();

        let d = p.draft(2).await.unwrap();
        assert_eq!(d.rank, 2);
        assert_eq!(d.topic, "First kayak topic 2");
        assert_eq!(d.text, "A drafted post.");
        assert_eq!(p.draft(11).await.unwrap_err().code(), "out_of_range");
    }
}
