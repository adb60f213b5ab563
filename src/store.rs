use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PlannerResult;
use crate::models::StoredQueue;

/// The single "latest queue" record. `load` never fails: unreadable state is absent state.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn load(&self) -> Option<StoredQueue>;
    async fn save_atomically(&self, queue: &StoredQueue) -> PlannerResult<()>;
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Ranks are 1..N in order, each weekIndex equals its rank, and the windows are
/// consecutive 7-day spans (end = start + 6, next start = start + 7).
pub fn is_well_formed(stored: &StoredQueue) -> bool {
    let mut expected_start: Option<NaiveDate> = None;
    for (i, item) in stored.queue.iter().enumerate() {
        if item.rank != i + 1 || item.week_index != item.rank {
            return false;
        }
        let (Some(start), Some(end)) = (parse_day(&item.week_start), parse_day(&item.week_end)) else {
            return false;
        };
        if expected_start.is_some_and(|e| e != start) || start.checked_add_days(Days::new(6)) != Some(end) {
            return false;
        }
        // room for the next window
        match start.checked_add_days(Days::new(7)) {
            Some(next) => expected_start = Some(next),
            None => return false,
        }
    }
    true
}

pub struct FileQueueRepository {
    path: PathBuf,
}

impl FileQueueRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QueueRepository for FileQueueRepository {
    async fn load(&self) -> Option<StoredQueue> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Queue file unreadable, treating as absent - {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice::<StoredQueue>(&bytes) {
            Ok(q) if is_well_formed(&q) => Some(q),
            Ok(_) => {
                warn!("Queue file has broken ranks or week windows, treating as absent - {}", self.path.display());
                None
            }
            Err(e) => {
                warn!("Queue file corrupted, treating as absent - {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save_atomically(&self, queue: &StoredQueue) -> PlannerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(queue)?;
        // one temp file per write so concurrent writers never share it
        let tmp = self.path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            Uuid::new_v4().simple()
        ));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!("Queue persisted - id={}, items={}, path={}", queue.queue_id, queue.queue.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Objective, QueueItem, Tone};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn window(rank: usize) -> (String, String) {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap() + Days::new(7 * (rank as u64 - 1));
        (start.to_string(), (start + Days::new(6)).to_string())
    }

    fn sample(ranks: &[usize]) -> StoredQueue {
        StoredQueue {
            queue_id: "q_test".into(),
            created_at: Utc::now(),
            mode: "rag".into(),
            total_posts: 3,
            queue: ranks
                .iter()
                .map(|&r| QueueItem {
                    rank: r,
                    topic: format!("Topic {}", r),
                    objective: Objective::Engagement,
                    tone: Tone::Casual,
                    cta: "Comment below".into(),
                    source_post_ids: vec![],
                    week_index: r,
                    week_start: window(r).0,
                    week_end: window(r).1,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn save_then_load_returns_same_queue_and_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/queue.json");
        let repo = FileQueueRepository::new(&path);
        let q = sample(&[1, 2]);

        repo.save_atomically(&q).await.unwrap();

        assert_eq!(repo.load().await, Some(q));
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["queue.json"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_one_path_all_succeed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.json");
        let writers: Vec<FileQueueRepository> = (0..6).map(|_| FileQueueRepository::new(&path)).collect();

        for round in 0..20 {
            let queues: Vec<StoredQueue> = (0..writers.len())
                .map(|w| StoredQueue { queue_id: format!("q_{}_{}", round, w), ..sample(&[1, 2, 3]) })
                .collect();
            let saves = writers.iter().zip(&queues).map(|(repo, q)| repo.save_atomically(q));
            for result in futures::future::join_all(saves).await {
                result.unwrap();
            }

            let loaded = writers[0].load().await.unwrap();
            assert!(queues.contains(&loaded));
        }
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn missing_file_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(FileQueueRepository::new(tmp.path().join("none.json")).load().await.is_none());
    }

    #[tokio::test]
    async fn corrupted_or_misshapen_file_is_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.json");
        let repo = FileQueueRepository::new(&path);

        std::fs::write(&path, b"{\"queueId\": \"half-written").unwrap();
        assert!(repo.load().await.is_none());

        std::fs::write(&path, br#"{"queueId":"x","queue":[]}"#).unwrap();
        assert!(repo.load().await.is_none());

        std::fs::write(&path, serde_json::to_vec(&sample(&[1, 3])).unwrap()).unwrap();
        assert!(repo.load().await.is_none());
    }

    #[tokio::test]
    async fn broken_week_windows_are_absent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("queue.json");
        let repo = FileQueueRepository::new(&path);

        let mut gap = sample(&[1, 2]);
        gap.queue[1].week_start = "2026-11-02".into();
        gap.queue[1].week_end = "2026-11-08".into();

        let mut short_week = sample(&[1]);
        short_week.queue[0].week_end = "2026-10-24".into();

        let mut unparsable = sample(&[1]);
        unparsable.queue[0].week_start = "next monday".into();

        let mut calendar_edge = sample(&[1]);
        calendar_edge.queue[0].week_start = (NaiveDate::MAX - Days::new(6)).to_string();
        calendar_edge.queue[0].week_end = NaiveDate::MAX.to_string();

        for bad in [gap, short_week, unparsable, calendar_edge] {
            std::fs::write(&path, serde_json::to_vec(&bad).unwrap()).unwrap();
            assert!(repo.load().await.is_none(), "loaded {:?}", bad.queue);
        }
    }
}
