use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::debug;

use docqa_core::error::Result;
use docqa_core::traits::{Embedder, VectorIndex};
use docqa_core::types::ScoredChunk;

use crate::with_timeout;

/// Nearest-chunk lookup over an index that is no longer written to.
///
/// Whether the index is empty is looked up once and shared by every clone.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    call_timeout: Duration,
    empty: Arc<OnceCell<bool>>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>, top_k: usize, call_timeout: Duration) -> Self {
        Self { embedder, index, top_k, call_timeout, empty: Arc::new(OnceCell::new()) }
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.empty
            .get_or_try_init(|| with_timeout("index lookup", self.call_timeout, self.index.is_empty()))
            .await
            .copied()
    }

    /// The `top_k` chunks nearest to `query`, best first. An empty index
    /// short-circuits without embedding the query.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        if self.is_empty().await? {
            return Ok(vec![]);
        }
        let vector = with_timeout("embedding", self.call_timeout, self.embedder.embed(query)).await?;
        let hits = with_timeout("index query", self.call_timeout, self.index.query(&vector, self.top_k)).await?;
        debug!(hits = hits.len(), top_k = self.top_k, "retrieved context");
        Ok(hits)
    }
}
