// src/render.rs
use crate::models::{GenerationOutcome, PostDraft, StoredQueue};

pub fn render_queue_markdown(q: &StoredQueue) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Post queue {}\n\n", q.queue_id));
    md.push_str(&format!(
        "Created {} · mode {} · corpus {} posts\n\n",
        q.created_at.format("%Y-%m-%d %H:%M UTC"),
        q.mode,
        q.total_posts
    ));

    if q.queue.is_empty() {
        md.push_str("_Queue is empty._\n");
        return md;
    }

    for item in &q.queue {
        md.push_str(&format!(
            "{}. **{}** ({} → {})\n",
            item.rank, item.topic, item.week_start, item.week_end
        ));
        md.push_str(&format!(
            "   - {} / {} — {}\n",
            item.objective.as_str(),
            item.tone.as_str(),
            item.cta
        ));
        if !item.source_post_ids.is_empty() {
            md.push_str(&format!("   - refs: {}\n", item.source_post_ids.join(", ")));
        }
    }
    md
}

pub fn render_outcome_markdown(out: &GenerationOutcome) -> String {
    let mut md = render_queue_markdown(&out.stored);
    md.push_str("\n## Topic seeds\n");
    for s in &out.topic_seeds {
        md.push_str(&format!("- {}\n", s));
    }
    md
}

pub fn render_draft_markdown(d: &PostDraft) -> String {
    let mut md = format!("## #{} {}\n\n{}\n", d.rank, d.topic, d.text.trim());
    if !d.source_post_ids.is_empty() {
        md.push_str(&format!("\n_refs: {}_\n", d.source_post_ids.join(", ")));
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Objective, QueueItem, Tone};
    use chrono::{TimeZone, Utc};

    #[test]
    fn queue_lists_items_with_windows() {
        let q = StoredQueue {
            queue_id: "q_1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
            mode: "rag".into(),
            total_posts: 12,
            queue: vec![QueueItem {
                rank: 1,
                topic: "Winter camping".into(),
                objective: Objective::Promotion,
                tone: Tone::Inspiring,
                cta: "Book a spot".into(),
                source_post_ids: vec!["a".into(), "b".into()],
                week_index: 1,
                week_start: "2026-10-19".into(),
                week_end: "2026-10-25".into(),
            }],
        };
        let md = render_queue_markdown(&q);
        assert!(md.contains("1. **Winter camping** (2026-10-19 → 2026-10-25)"));
        assert!(md.contains("promotion / inspiring — Book a spot"));
        assert!(md.contains("refs: a, b"));
    }
}
