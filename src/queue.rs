//! The persisted plan and its mutations.
//!
//! All mutations run under one in-process lock and re-derive rank, weekIndex
//! and the weekly windows for the whole list before the atomic save.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{Objective, QueueItem, StoredQueue, Tone};
use crate::parse::{extract_list, Extract};
use crate::store::QueueRepository;

const DATE_FMT: &str = "%Y-%m-%d";

pub fn first_monday_on_or_after(date: NaiveDate) -> NaiveDate {
    let ahead = (7 - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(ahead as i64)
}

/// Monday on/after `now`, read in the channel's timezone.
pub fn slot_anchor(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    first_monday_on_or_after(now.with_timezone(&tz).date_naive())
}

/// Renumbers 1..N and lays out consecutive 7-day windows from `anchor`.
pub fn assign_slots(items: &mut [QueueItem], anchor: NaiveDate) {
    for (i, item) in items.iter_mut().enumerate() {
        let start = anchor + Duration::days(7 * i as i64);
        item.rank = i + 1;
        item.week_index = i + 1;
        item.week_start = start.format(DATE_FMT).to_string();
        item.week_end = (start + Duration::days(6)).format(DATE_FMT).to_string();
    }
}

pub fn new_queue_id(now: DateTime<Utc>) -> String {
    let rand = Uuid::new_v4().simple().to_string();
    format!("q_{}_{}", now.format("%Y%m%dT%H%M%S"), &rand[..8])
}

// "1. ", "2) ", "10: ", "- ", "* ", "• "; the separator must be followed by whitespace
static ORDINAL_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:\d+[.):]|[-*•])\s+").unwrap());

/// Accepts a JSON list or newline-separated text with optional "1." / "-" prefixes.
pub fn parse_topics_input(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Extract::Parsed(list) = extract_list::<String>(trimmed) {
            return list
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }
    trimmed
        .lines()
        .map(|l| ORDINAL_PREFIX.replace(l, "").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Slot metadata is index-aligned with `previous`, falling back to its first item, then to defaults.
pub fn rebuild_items(
    previous: &[QueueItem],
    topics: &[String],
    anchor: NaiveDate,
    cfg: &QueueConfig,
) -> Vec<QueueItem> {
    let mut items: Vec<QueueItem> = topics
        .iter()
        .enumerate()
        .map(|(i, topic)| {
            let (objective, tone, cta, source_post_ids) = match previous.get(i).or(previous.first()) {
                Some(p) => (p.objective, p.tone, p.cta.clone(), p.source_post_ids.clone()),
                None => (cfg.default_objective, cfg.default_tone, cfg.default_cta.clone(), Vec::new()),
            };
            composed_item(topic.clone(), objective, tone, cta, source_post_ids)
        })
        .collect();
    assign_slots(&mut items, anchor);
    items
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMutation {
    Replace(Vec<String>),
    Swap { from: usize, to: usize },
    Remove { index: usize },
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct QueueStateMachine {
    repo: Arc<dyn QueueRepository>,
    cfg: QueueConfig,
    tz: Tz,
    clock: Clock,
    writer: Mutex<()>,
}

impl QueueStateMachine {
    pub fn new(repo: Arc<dyn QueueRepository>, cfg: QueueConfig) -> anyhow::Result<Self> {
        let tz = cfg.tz()?;
        Ok(Self { repo, cfg, tz, clock: Utc::now, writer: Mutex::new(()) })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub fn anchor_now(&self) -> NaiveDate {
        self.anchor_at(self.now())
    }

    /// Slot anchor for an instant the caller already read from the clock.
    pub fn anchor_at(&self, now: DateTime<Utc>) -> NaiveDate {
        slot_anchor(now, self.tz)
    }

    pub async fn load(&self) -> PlannerResult<StoredQueue> {
        self.repo.load().await.ok_or(PlannerError::NotFound)
    }

    /// Replaces the whole record, e.g. after a regeneration.
    pub async fn commit(&self, stored: &StoredQueue) -> PlannerResult<()> {
        let _guard = self.writer.lock().await;
        self.repo.save_atomically(stored).await?;
        info!("Queue committed - id={}, items={}, mode={}", stored.queue_id, stored.queue.len(), stored.mode);
        Ok(())
    }

    pub async fn apply(&self, mutation: QueueMutation) -> PlannerResult<StoredQueue> {
        match mutation {
            QueueMutation::Replace(topics) => self.replace(topics).await,
            QueueMutation::Swap { from, to } => self.swap(from, to).await,
            QueueMutation::Remove { index } => self.remove(index).await,
        }
    }

    pub async fn replace(&self, topics: Vec<String>) -> PlannerResult<StoredQueue> {
        let topics: Vec<String> = topics
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if topics.is_empty() {
            return Err(PlannerError::InvalidInput("replace needs at least one topic".into()));
        }
        if topics.len() > self.cfg.max_items {
            return Err(PlannerError::InvalidInput(format!(
                "replace accepts at most {} topics, got {}",
                self.cfg.max_items,
                topics.len()
            )));
        }

        let _guard = self.writer.lock().await;
        let now = self.now();
        let stored = match self.repo.load().await {
            Some(mut current) => {
                current.queue = rebuild_items(&current.queue, &topics, slot_anchor(now, self.tz), &self.cfg);
                current
            }
            None => StoredQueue {
                queue_id: new_queue_id(now),
                created_at: now,
                mode: "manual".into(),
                total_posts: 0,
                queue: rebuild_items(&[], &topics, slot_anchor(now, self.tz), &self.cfg),
            },
        };
        self.repo.save_atomically(&stored).await?;
        debug!("Queue replaced - items={}", stored.queue.len());
        Ok(stored)
    }

    pub async fn replace_text(&self, raw: &str) -> PlannerResult<StoredQueue> {
        self.replace(parse_topics_input(raw)).await
    }

    /// 1-based positions. Windows stay positional: the first slot's start is kept as the anchor.
    pub async fn swap(&self, from: usize, to: usize) -> PlannerResult<StoredQueue> {
        let _guard = self.writer.lock().await;
        let mut current = self.repo.load().await.ok_or(PlannerError::NotFound)?;
        let len = current.queue.len();
        if len < 2 {
            return Err(PlannerError::InvalidInput(format!("swap needs at least 2 items, queue has {}", len)));
        }
        for index in [from, to] {
            if index == 0 || index > len {
                return Err(PlannerError::OutOfRange { index, len });
            }
        }

        let anchor = current
            .queue
            .first()
            .and_then(|i| NaiveDate::parse_from_str(&i.week_start, DATE_FMT).ok())
            .unwrap_or_else(|| self.anchor_now());
        current.queue.swap(from - 1, to - 1);
        assign_slots(&mut current.queue, anchor);

        self.repo.save_atomically(&current).await?;
        debug!("Queue swapped - from={}, to={}", from, to);
        Ok(current)
    }

    /// 1-based. Rebuilds through the replace path, so windows restart from now.
    pub async fn remove(&self, index: usize) -> PlannerResult<StoredQueue> {
        let _guard = self.writer.lock().await;
        let mut current = self.repo.load().await.ok_or(PlannerError::NotFound)?;
        let len = current.queue.len();
        if index == 0 || index > len {
            return Err(PlannerError::OutOfRange { index, len });
        }

        let topics: Vec<String> = current
            .queue
            .iter()
            .enumerate()
            .filter(|(i, _)| i + 1 != index)
            .map(|(_, item)| item.topic.clone())
            .collect();
        current.queue = rebuild_items(&current.queue, &topics, self.anchor_now(), &self.cfg);

        self.repo.save_atomically(&current).await?;
        debug!("Queue item removed - index={}, remaining={}", index, current.queue.len());
        Ok(current)
    }
}

/// Metadata for a freshly composed item before slots are assigned.
pub fn composed_item(
    topic: String,
    objective: Objective,
    tone: Tone,
    cta: String,
    source_post_ids: Vec<String>,
) -> QueueItem {
    QueueItem {
        rank: 0,
        topic,
        objective,
        tone,
        cta,
        source_post_ids,
        week_index: 0,
        week_start: String::new(),
        week_end: String::new(),
    }
}
