use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Document, DocumentChunk, ScoredChunk};

pub trait DocumentSource: Send + Sync {
    fn list_documents(&self, root: &Path) -> Result<Vec<Document>>;
}

pub trait TextSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;

    /// Chunks paired with the byte offset at which each one starts in `text`.
    ///
    /// The default locates each chunk by searching forward from the previous
    /// one, which can land on an earlier copy of repeated text. Splitters that
    /// know where their pieces came from should override it.
    fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        let mut search_from = 0usize;
        let mut out = Vec::new();
        for chunk in self.split(text) {
            let start = text[search_from..].find(chunk.as_str()).map_or(search_from, |pos| search_from + pos);
            search_from = text[start..].chars().next().map_or(start, |c| start + c.len_utf8());
            out.push((start, chunk));
        }
        out
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the model behind the vectors (e.g. `ollama:nomic-embed-text`).
    fn model_id(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::Error::Embedding("embedding service returned no vector".into()))
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store `chunks` with their vectors; `vectors[i]` belongs to `chunks[i]`.
    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Up to `k` chunks ordered by descending similarity to `vector`.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
