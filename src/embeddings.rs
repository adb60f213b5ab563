use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use crate::config::EmbeddingConfig;
use crate::error::{PlannerError, PlannerResult};

/// Maps texts to vectors, positionally aligned with the input.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbeddings {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddings {
    pub fn new(api_base: &str, api_key: &str, cfg: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddings {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .with_context(|| format!("Request failed for {}", url))?
            .error_for_status()
            .with_context(|| format!("HTTP error for {}", url))?;

        let mut body: EmbeddingResponse = resp
            .json()
            .await
            .with_context(|| format!("Decoding JSON for {}", url))?;
        // the API may reorder rows; `index` is authoritative
        body.data.sort_by_key(|r| r.index);
        Ok(body.data.into_iter().map(|r| r.embedding).collect())
    }
}

/// Bounded, concurrent batching over an [`EmbeddingProvider`] with a per-process cache.
pub struct BatchedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    max_concurrent: usize,
    cache: Mutex<HashMap<u64, Vec<f32>>>,
}

impl BatchedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, cfg: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: cfg.batch_size.max(1),
            max_concurrent: cfg.max_concurrent_batches.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key(&self, text: &str) -> u64 {
        xxh3_64(format!("{}|{}", self.provider.model_id(), text).as_bytes())
    }

    fn cached(&self, key: u64) -> Option<Vec<f32>> {
        self.cache.lock().ok()?.get(&key).cloned()
    }

    pub async fn embed_all(&self, texts: &[String]) -> PlannerResult<Vec<Vec<f32>>> {
        let start = std::time::Instant::now();

        let mut pending: Vec<String> = Vec::new();
        let mut pending_keys: Vec<u64> = Vec::new();
        for t in texts {
            let k = self.key(t);
            if self.cached(k).is_none() && !pending_keys.contains(&k) {
                pending_keys.push(k);
                pending.push(t.clone());
            }
        }
        debug!(
            "Embedding request - texts={}, uncached={}, batch_size={}",
            texts.len(),
            pending.len(),
            self.batch_size
        );

        let batches: Vec<&[String]> = pending.chunks(self.batch_size).collect();
        let mut offset = 0usize;
        for group in batches.chunks(self.max_concurrent) {
            let tasks = group.iter().map(|b| self.provider.embed(b));
            let results = futures::future::join_all(tasks).await;

            for (batch, result) in group.iter().zip(results) {
                let vectors = result.map_err(|e| PlannerError::Provider(e.to_string()))?;
                if vectors.len() != batch.len() {
                    return Err(PlannerError::Provider(format!(
                        "embedding provider returned {} vectors for {} texts",
                        vectors.len(),
                        batch.len()
                    )));
                }
                let mut cache = self
                    .cache
                    .lock()
                    .map_err(|_| PlannerError::Provider("embedding cache poisoned".into()))?;
                for (i, v) in vectors.into_iter().enumerate() {
                    cache.insert(pending_keys[offset + i], v);
                }
                offset += batch.len();
            }
        }

        let out = texts
            .iter()
            .map(|t| {
                self.cached(self.key(t))
                    .ok_or_else(|| PlannerError::Provider("embedding missing after batch".into()))
            })
            .collect::<PlannerResult<Vec<_>>>()?;

        if !pending.is_empty() {
            info!(
                "Embedding completed - duration={:.2}s, embedded={}, batches={}",
                start.elapsed().as_secs_f32(),
                pending.len(),
                batches.len()
            );
        }
        Ok(out)
    }
}
