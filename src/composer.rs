use std::sync::Arc;
use tracing::{debug, warn};

use crate::budget::{assert_prompt_budget, excerpt, PROMPT_TOKEN_CAP};
use crate::compress::GenerativeProvider;
use crate::config::QueueConfig;
use crate::error::{PlannerError, PlannerResult};
use crate::models::{IndexedPost, Objective, QueueItem, Tone};
use crate::out_models::{DraftResponse, EvidenceLine, PlanItemResponse};
use crate::parse::extract_object;
use crate::prompts::{user_draft, user_plan_item};
use crate::queue::composed_item;

fn references_json(refs: &[&IndexedPost], max_chars: usize) -> PlannerResult<String> {
    let lines: Vec<EvidenceLine> = refs
        .iter()
        .map(|p| EvidenceLine {
            channel: p.channel.clone(),
            text: excerpt(&p.text, max_chars),
            reactions: p.reactions() as u64,
        })
        .collect();
    Ok(serde_json::to_string(&lines)?)
}

pub struct PlanComposer {
    provider: Arc<dyn GenerativeProvider>,
    defaults: QueueConfig,
    evidence_chars: usize,
}

impl PlanComposer {
    pub fn new(provider: Arc<dyn GenerativeProvider>, defaults: QueueConfig, evidence_chars: usize) -> Self {
        Self { provider, defaults, evidence_chars }
    }

    /// Slot fields are left blank; the queue assigns them.
    pub async fn compose(&self, topic: &str, refs: &[&IndexedPost]) -> PlannerResult<QueueItem> {
        let prompt = user_plan_item(topic, &references_json(refs, self.evidence_chars)?);
        assert_prompt_budget(&prompt, PROMPT_TOKEN_CAP)?;

        let raw = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| PlannerError::Provider(e.to_string()))?;
        let plan: PlanItemResponse = extract_object(&raw)
            .into_result()
            .map_err(|e| PlannerError::InvalidPlanResponse(format!("topic {:?}: {}", topic, e)))?;

        let objective = Objective::parse_lenient(&plan.objective).unwrap_or_else(|| {
            warn!("Unknown objective {:?} for topic {:?}, using default", plan.objective, topic);
            self.defaults.default_objective
        });
        let tone = Tone::parse_lenient(&plan.tone).unwrap_or_else(|| {
            warn!("Unknown tone {:?} for topic {:?}, using default", plan.tone, topic);
            self.defaults.default_tone
        });
        let cta = match plan.cta.trim() {
            "" => self.defaults.default_cta.clone(),
            s => s.to_string(),
        };
        debug!("Plan item composed - topic={:?}, objective={}, tone={}, refs={}", topic, objective.as_str(), tone.as_str(), refs.len());

        Ok(composed_item(
            topic.to_string(),
            objective,
            tone,
            cta,
            refs.iter().map(|p| p.id.clone()).collect(),
        ))
    }

    pub async fn draft(&self, item: &QueueItem, refs: &[&IndexedPost]) -> PlannerResult<String> {
        let prompt = user_draft(
            &item.topic,
            item.objective.as_str(),
            item.tone.as_str(),
            &item.cta,
            &references_json(refs, self.evidence_chars)?,
        );
        assert_prompt_budget(&prompt, PROMPT_TOKEN_CAP)?;

        let raw = self
            .provider
            .complete(&prompt)
            .await
            .map_err(|e| PlannerError::Provider(e.to_string()))?;
        let draft: DraftResponse = extract_object(&raw)
            .into_result()
            .map_err(PlannerError::InvalidDraftResponse)?;
        let text = draft.text.trim();
        if text.is_empty() {
            return Err(PlannerError::InvalidDraftResponse("empty draft text".into()));
        }
        Ok(text.to_string())
    }
}
