//! In-process vector index.
//!
//! Brute-force cosine similarity over every stored vector. Written once at
//! startup and read concurrently afterwards.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorIndex;
use docqa_core::types::{DocumentChunk, ScoredChunk};

struct Entry {
    chunk: DocumentChunk,
    vector: Vec<f32>,
    norm: f32,
}

#[derive(Default)]
struct Inner {
    dim: Option<usize>,
    entries: Vec<Entry>,
}

#[derive(Default)]
pub struct MemoryIndex {
    inner: RwLock<Inner>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality fixed by the first insert, if any.
    pub async fn dim(&self) -> Option<usize> {
        self.inner.read().await.dim
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub(crate) fn check_batch(chunks: &[DocumentChunk], vectors: &[Vec<f32>], dim: Option<usize>) -> Result<usize> {
    if chunks.len() != vectors.len() {
        return Err(Error::Index(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    let expected = dim.or_else(|| vectors.first().map(Vec::len)).unwrap_or(0);
    if expected == 0 {
        return Err(Error::Index("cannot index zero-length vectors".into()));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(Error::Index(format!(
            "vector dimension {} does not match index dimension {}",
            bad.len(),
            expected
        )));
    }
    Ok(expected)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.is_empty() && vectors.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.write().await;
        let dim = check_batch(chunks, vectors, inner.dim)?;
        inner.dim = Some(dim);
        for (chunk, vector) in chunks.iter().zip(vectors) {
            inner.entries.push(Entry { chunk: chunk.clone(), norm: l2_norm(vector), vector: vector.clone() });
        }
        debug!(added = chunks.len(), total = inner.entries.len(), "memory index updated");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let inner = self.inner.read().await;
        let Some(dim) = inner.dim else {
            return Ok(vec![]);
        };
        if vector.len() != dim {
            return Err(Error::Index(format!(
                "query dimension {} does not match index dimension {}",
                vector.len(),
                dim
            )));
        }
        let query_norm = l2_norm(vector);
        let mut scored: Vec<(f32, &Entry)> = inner
            .entries
            .iter()
            .map(|entry| {
                let dot: f32 = entry.vector.iter().zip(vector).map(|(a, b)| a * b).sum();
                let denom = entry.norm * query_norm;
                let score = if denom == 0.0 { 0.0 } else { dot / denom };
                (score, entry)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| ScoredChunk { chunk: entry.chunk.clone(), score })
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.inner.read().await.entries.len())
    }
}
