//! Embedding clients.
//!
//! [`OllamaEmbedder`] talks to an Ollama-compatible `/api/embed` endpoint.
//! [`FakeEmbedder`] is a deterministic hashing embedder for development and
//! tests, selected with `embedding.provider = "fake"` or
//! `APP_USE_FAKE_EMBEDDINGS=1`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docqa_core::config::{EmbeddingProvider, Settings};
use docqa_core::error::{Error, Result};
use docqa_core::traits::Embedder;

pub struct OllamaEmbedder {
    http: Client,
    base_url: String,
    model: String,
    model_id: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration, batch_size: usize) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            model_id: format!("ollama:{model}"),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.ollama.base_url,
            &settings.embedding.model,
            Duration::from_secs(settings.ollama.timeout_secs),
            settings.embedding.batch_size,
        )
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("request to {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&text).map(|b| b.error).unwrap_or(text);
            return Err(Error::Embedding(format!("{} returned {}: {}", url, status, detail)));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("invalid response from {url}: {e}")))?;
        if body.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                body.embeddings.len()
            )));
        }
        Ok(body.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = i, size = batch.len(), model = %self.model, "embedding batch");
            out.extend(self.embed_request(batch).await?);
        }
        if let Some(first) = out.first() {
            let dim = first.len();
            if dim == 0 || out.iter().any(|v| v.len() != dim) {
                return Err(Error::Embedding("embedding service returned vectors of inconsistent size".into()));
            }
        }
        Ok(out)
    }
}

/// Feature-hashing embedder: each lowercase token lands in a fixed bucket,
/// the vector is L2-normalized. Same text, same vector.
pub struct FakeEmbedder {
    dim: usize,
    model_id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, model_id: format!("fake:d{dim}") }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty());
        for token in tokens {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn get_default_embedder(settings: &Settings) -> Box<dyn Embedder> {
    match settings.embedding.provider {
        EmbeddingProvider::Fake => {
            info!(dim = settings.embedding.fake_dim, "using fake embedder");
            Box::new(FakeEmbedder::new(settings.embedding.fake_dim))
        }
        EmbeddingProvider::Ollama => {
            info!(base_url = %settings.ollama.base_url, model = %settings.embedding.model, "using Ollama embedder");
            Box::new(OllamaEmbedder::from_settings(settings))
        }
    }
}
