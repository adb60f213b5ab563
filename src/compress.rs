use anyhow::{anyhow, Result};
use async_trait::async_trait;
use awful_aj::{api::ask, config::AwfulJadeConfig, template::ChatTemplate};
use tracing::{debug, info};

/// Prompt in, free text out. Output may be malformed; callers parse tolerantly.
/// Futures are not `Send` (awful_aj's `ask` isn't); fan out with `join_all`, never `spawn`.
#[async_trait(?Send)]
pub trait GenerativeProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct AwfulJadeProvider {
    cfg: AwfulJadeConfig,
    tpl: ChatTemplate,
}

impl AwfulJadeProvider {
    pub fn new(cfg: AwfulJadeConfig, tpl: ChatTemplate) -> Self {
        Self { cfg, tpl }
    }
}

#[async_trait(?Send)]
impl GenerativeProvider for AwfulJadeProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        llm_call(&self.cfg, &self.tpl, prompt).await
    }
}

pub async fn llm_call(cfg: &AwfulJadeConfig, tpl: &ChatTemplate, user: &str) -> Result<String> {
    let start = std::time::Instant::now();

    debug!("LLM call starting - model={}, prompt_length={} chars", cfg.model, user.len());

    // Map Box<dyn StdError> -> anyhow::Error *before* `?`
    let answer = ask(cfg, user.to_string(), tpl, None, None, false)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    info!(
        "LLM API call completed - duration={:.2}s, response_length={} chars",
        start.elapsed().as_secs_f32(),
        answer.len()
    );

    Ok(answer)
}
