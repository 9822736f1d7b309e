//! Embedding gateway: batched text-to-vector with caching and retry
//!
//! The backend is a black box behind `EmbeddingBackend`. The gateway caches
//! by content hash so unchanged text never re-embeds across indexing runs,
//! and retries transient backend failures with exponential backoff before
//! surfacing EmbeddingUnavailable.

use crate::error::WaypointError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// External embedding model: deterministic for identical input under a fixed
/// model version.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Gateway wrapping a backend with a hash-keyed cache and retry policy.
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    cache: RwLock<HashMap<String, Vec<f32>>>,
    retries: u32,
    backoff_ms: u64,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, retries: u32, backoff_ms: u64) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            retries,
            backoff_ms,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, WaypointError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        Ok(vectors.remove(0))
    }

    /// Embed a batch, serving cached vectors and sending only misses to the
    /// backend in one call.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, WaypointError> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| blake3::hash(t.as_bytes()).to_hex().to_string())
            .collect();

        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        {
            let cache = self.cache.read().await;
            for (i, key) in keys.iter().enumerate() {
                if let Some(v) = cache.get(key) {
                    out[i] = Some(v.clone());
                }
            }
        }

        let miss_indices: Vec<usize> = (0..texts.len()).filter(|i| out[*i].is_none()).collect();
        let misses = miss_indices.len();
        if !miss_indices.is_empty() {
            let miss_texts: Vec<String> =
                miss_indices.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embed_with_retry(&miss_texts).await?;

            let mut cache = self.cache.write().await;
            for (slot, vector) in miss_indices.into_iter().zip(vectors) {
                cache.insert(keys[slot].clone(), vector.clone());
                out[slot] = Some(vector);
            }
        }

        debug!(
            "Embedded {} texts ({} cache hits)",
            texts.len(),
            texts.len() - misses
        );

        Ok(out.into_iter().flatten().collect())
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, WaypointError> {
        let mut last_err = String::new();
        let attempts = self.retries.max(1);

        for attempt in 0..attempts {
            match self.backend.embed_batch(texts).await {
                Ok(vectors) if vectors.len() == texts.len() => return Ok(vectors),
                Ok(vectors) => {
                    last_err = format!(
                        "backend returned {} vectors for {} texts",
                        vectors.len(),
                        texts.len()
                    );
                }
                Err(e) => last_err = e.to_string(),
            }

            if attempt + 1 < attempts {
                let backoff = Duration::from_millis(self.backoff_ms << attempt);
                warn!(
                    "Embedding attempt {}/{} failed ({}), retrying in {:?}",
                    attempt + 1,
                    attempts,
                    last_err,
                    backoff
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(WaypointError::EmbeddingUnavailable {
            attempts,
            reason: last_err,
        })
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }
}

/// Request to the embedding service
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
}

/// Response from the embedding service
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP-based embedding backend
pub struct HttpEmbedder {
    service_url: String,
    client: reqwest::Client,
}

impl HttpEmbedder {
    pub fn new(service_url: String) -> Self {
        Self {
            service_url,
            client: reqwest::Client::new(),
        }
    }

    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.service_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    fn name(&self) -> &'static str {
        "http_embedder"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.service_url);
        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest { texts })
            .send()
            .await
            .context("Failed to call embedding service")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding service error ({}): {}", status, error_text);
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .context("Failed to parse embedding service response")?;

        Ok(parsed.embeddings.into_iter().map(unit_normalize).collect())
    }
}

/// Deterministic token-bucket embedder for tests and mock mode. Texts that
/// share tokens land near each other, which is enough to exercise ranking.
pub struct MockEmbedder {
    dims: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { dims: 16 }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.is_empty() {
                continue;
            }
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let bucket = bytes[0] as usize % self.dims;
            let sign = if bytes[1] % 2 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        unit_normalize(v)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    fn name(&self) -> &'static str {
        "mock_embedder"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn unit_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// An always-failing backend, for exercising the retry path in tests.
#[cfg(test)]
pub struct FailingEmbedder;

#[cfg(test)]
#[async_trait]
impl EmbeddingBackend for FailingEmbedder {
    fn name(&self) -> &'static str {
        "failing_embedder"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("backend down")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embedding_is_deterministic() {
        let backend = MockEmbedder::new();
        let texts = vec!["where is the parser".to_string()];
        let a = backend.embed_batch(&texts).await.unwrap();
        let b = backend.embed_batch(&texts).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn shared_tokens_are_closer_than_disjoint() {
        let backend = MockEmbedder::new();
        let texts = vec![
            "parser module location".to_string(),
            "parser module internals".to_string(),
            "unrelated deployment checklist".to_string(),
        ];
        let vs = backend.embed_batch(&texts).await.unwrap();
        let near = crate::store::cosine_distance(&vs[0], &vs[1]);
        let far = crate::store::cosine_distance(&vs[0], &vs[2]);
        assert!(near < far);
    }

    #[tokio::test]
    async fn cache_avoids_recomputation() {
        let embedder = Embedder::new(Arc::new(MockEmbedder::new()), 1, 1);
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embedder.cache_len().await, 2);
        embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embedder.cache_len().await, 2);
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_embedding_unavailable() {
        let embedder = Embedder::new(Arc::new(FailingEmbedder), 2, 1);
        let err = embedder.embed("anything").await.unwrap_err();
        assert!(matches!(
            err,
            WaypointError::EmbeddingUnavailable { attempts: 2, .. }
        ));
    }
}
