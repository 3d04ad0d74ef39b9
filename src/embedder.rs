//! Embedding provider abstraction and the Ollama implementation.
//!
//! The core consumes the [`Embedder`] capability and never talks to a
//! provider directly. The default implementation calls Ollama's
//! `POST {base}/api/embed` endpoint and L2-normalizes the result so the
//! store can treat dot product and cosine similarity as the same thing.
//!
//! # Retry strategy
//!
//! [`embed_with_retry`] retries any provider failure with exponential
//! backoff (100 ms, 200 ms, 400 ms, …) and aborts immediately on
//! cancellation. [`embed_batch`] fans out over a semaphore-bounded pool
//! of 1..=8 workers, returns vectors in input order, and surfaces the
//! first failure (tagged with its input index) after in-flight workers
//! drain.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{IndexError, Result};

/// Capability for turning text into a unit-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text. Implementations return a normalized, non-empty
    /// vector or [`IndexError::EmbedUnavailable`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, for status reporting.
    fn model_name(&self) -> &str;
}

/// Embedder backed by an Ollama server.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client,
        }
    }

    /// Probe the provider by embedding a trivial string.
    pub async fn test_connection(&self) -> Result<()> {
        self.embed("test").await.map(|_| ())
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::EmbedUnavailable {
                reason: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(IndexError::EmbedUnavailable {
                reason: format!("ollama returned {status}: {detail}"),
            });
        }

        let parsed: EmbedResponse =
            response
                .json()
                .await
                .map_err(|e| IndexError::EmbedUnavailable {
                    reason: format!("invalid response: {e}"),
                })?;

        let vector = parsed
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| IndexError::EmbedUnavailable {
                reason: "no embeddings returned".to_string(),
            })?;

        Ok(normalize(vector))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Retry an embed call with exponential backoff. Cancellation is checked
/// before every attempt and during the backoff sleep.
pub async fn embed_with_retry(
    embedder: &dyn Embedder,
    text: &str,
    max_attempts: usize,
    cancel: &CancellationToken,
) -> Result<Vec<f32>> {
    let mut last_err = None;

    for attempt in 0..max_attempts {
        if cancel.is_cancelled() {
            return Err(IndexError::Cancelled);
        }

        match embedder.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(err) => last_err = Some(err),
        }

        if attempt + 1 < max_attempts {
            let backoff = Duration::from_millis(100 * (1 << attempt));
            tokio::select! {
                _ = cancel.cancelled() => return Err(IndexError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    Err(last_err.unwrap_or(IndexError::EmbedUnavailable {
        reason: "no attempts made".to_string(),
    }))
}

/// Embed a batch with bounded parallelism. Results come back in input
/// order; the whole batch aborts on cancellation; the first worker error
/// is surfaced (wrapped with its input index) after in-flight workers
/// finish.
pub async fn embed_batch(
    embedder: Arc<dyn Embedder>,
    texts: Vec<String>,
    workers: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let workers = workers.clamp(1, 8);
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut join_set = tokio::task::JoinSet::new();

    for (index, text) in texts.into_iter().enumerate() {
        if cancel.is_cancelled() {
            join_set.abort_all();
            return Err(IndexError::Cancelled);
        }

        let embedder = Arc::clone(&embedder);
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return (index, Err(IndexError::Cancelled)),
            };
            if cancel.is_cancelled() {
                return (index, Err(IndexError::Cancelled));
            }
            let result = embed_with_retry(embedder.as_ref(), &text, 3, &cancel).await;
            (index, result)
        });
    }

    let mut results: Vec<Option<Vec<f32>>> = Vec::new();
    let mut first_error: Option<(usize, IndexError)> = None;

    while let Some(joined) = join_set.join_next().await {
        let (index, result) = joined.map_err(|e| IndexError::Other(e.to_string()))?;
        match result {
            Ok(vector) => {
                if results.len() <= index {
                    results.resize(index + 1, None);
                }
                results[index] = Some(vector);
            }
            Err(err) => {
                let replace = first_error
                    .as_ref()
                    .map(|(i, _)| index < *i)
                    .unwrap_or(true);
                if replace {
                    first_error = Some((index, err));
                }
            }
        }
    }

    if let Some((index, err)) = first_error {
        if matches!(err, IndexError::Cancelled) {
            return Err(IndexError::Cancelled);
        }
        return Err(IndexError::EmbedBatch {
            index,
            source: Box::new(err),
        });
    }

    Ok(results.into_iter().map(|v| v.unwrap_or_default()).collect())
}

/// L2-normalize a vector; zero vectors are returned unchanged.
///
/// Every vector leaving a provider is unit length, which is what lets
/// the store rank candidates by plain dot product.
pub fn normalize(v: Vec<f32>) -> Vec<f32> {
    let norm: f64 = v.iter().map(|&x| x as f64 * x as f64).sum::<f64>().sqrt();
    if norm == 0.0 {
        return v;
    }
    v.into_iter().map(|x| (x as f64 / norm) as f32).collect()
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder for tests: hashes character trigrams into a
    /// fixed number of buckets, then normalizes. Similar strings produce
    /// similar vectors, no network required.
    pub struct HashEmbedder {
        pub dims: usize,
        pub calls: AtomicUsize,
    }

    impl HashEmbedder {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for HashEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut v = vec![0f32; self.dims];
            let lower = text.to_lowercase();
            let bytes = lower.as_bytes();
            for window in bytes.windows(3) {
                let mut h: usize = 5381;
                for &b in window {
                    h = h.wrapping_mul(33).wrapping_add(b as usize);
                }
                v[h % self.dims] += 1.0;
            }
            Ok(normalize(v))
        }

        fn model_name(&self) -> &str {
            "hash-test"
        }
    }

    /// Embedder that always fails, for retry/backoff tests.
    pub struct FailingEmbedder {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(IndexError::EmbedUnavailable {
                reason: "down".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(vec![3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let embedder = FailingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();
        let result = embed_with_retry(&embedder, "x", 3, &cancel).await;
        assert!(result.is_err());
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_cancellation_short_circuits() {
        let embedder = FailingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = embed_with_retry(&embedder, "x", 3, &cancel).await;
        assert!(matches!(result, Err(IndexError::Cancelled)));
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embedder = Arc::new(HashEmbedder::new(16));
        let cancel = CancellationToken::new();
        let texts: Vec<String> = (0..20).map(|i| format!("text number {i}")).collect();
        let vectors = embed_batch(embedder.clone(), texts.clone(), 4, &cancel)
            .await
            .unwrap();

        assert_eq!(vectors.len(), 20);
        for (i, text) in texts.iter().enumerate() {
            let expected = embedder.embed(text).await.unwrap();
            assert_eq!(vectors[i], expected, "order broken at {i}");
        }
    }

    #[tokio::test]
    async fn test_batch_error_carries_index() {
        let embedder: Arc<dyn Embedder> = Arc::new(FailingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let cancel = CancellationToken::new();
        let result = embed_batch(embedder, vec!["a".into(), "b".into()], 2, &cancel).await;
        match result {
            Err(IndexError::EmbedBatch { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected EmbedBatch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_empty_input() {
        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(8));
        let cancel = CancellationToken::new();
        let vectors = embed_batch(embedder, Vec::new(), 4, &cancel).await.unwrap();
        assert!(vectors.is_empty());
    }
}
