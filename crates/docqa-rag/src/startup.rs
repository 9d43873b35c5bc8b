//! Startup: load and chunk the document directory, embed and index every
//! chunk, then build the answer pipelines over the filled index.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use docqa_core::config::Settings;
use docqa_core::data_processor::{DataProcessor, DirectoryLoader, RecursiveTextSplitter};
use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, Generator, VectorIndex};
use docqa_core::types::DocumentChunk;
use docqa_llm::OllamaGenerator;

use crate::pipeline::{ConversationalRetrieval, RetrievalQa};
use crate::retriever::Retriever;
use crate::with_timeout;

pub struct Pipelines {
    pub retrieval_qa: RetrievalQa,
    pub conversational: ConversationalRetrieval,
    pub chunks: usize,
}

/// Embed `chunks` in batches of `batch_size` and add them to `index`.
pub async fn index_chunks(
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    chunks: &[DocumentChunk],
    batch_size: usize,
    call_timeout: Duration,
) -> Result<()> {
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = with_timeout("embedding", call_timeout, embedder.embed_batch(&texts)).await?;
        with_timeout("index insert", call_timeout, index.add(batch, &vectors)).await?;
    }
    Ok(())
}

/// Load, chunk, embed and index the configured directory, then wire both
/// pipelines over `index`.
pub async fn build_pipelines(
    settings: &Settings,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
) -> Result<Pipelines> {
    let started = Instant::now();
    let documents_dir = settings.documents_dir();
    info!(dir = %documents_dir.display(), embedder = embedder.model_id(), generator = generator.model_id(), "building index");

    let splitter = RecursiveTextSplitter::from_settings(&settings.chunking)?;
    info!(chunk_size = splitter.chunk_size(), chunk_overlap = splitter.chunk_overlap(), "chunking documents");
    let processor = DataProcessor::with_parts(DirectoryLoader::from_settings(&settings.documents), splitter);
    let walk_dir = documents_dir.clone();
    let chunks = tokio::task::spawn_blocking(move || processor.process_directory(&walk_dir))
        .await
        .map_err(|e| Error::Load { path: documents_dir.clone(), reason: format!("loader task failed: {e}") })??;

    let call_timeout = Duration::from_secs(settings.rag.call_timeout_secs);
    index_chunks(embedder.as_ref(), index.as_ref(), &chunks, settings.embedding.batch_size, call_timeout).await?;
    info!(chunks = chunks.len(), elapsed_ms = started.elapsed().as_millis() as u64, "index built");

    let retriever = Retriever::new(embedder, index, settings.rag.top_k, call_timeout);
    Ok(Pipelines {
        retrieval_qa: RetrievalQa::new(retriever.clone(), generator.clone(), call_timeout),
        conversational: ConversationalRetrieval::new(retriever, generator, settings.rag.condense_question, call_timeout),
        chunks: chunks.len(),
    })
}

/// [`build_pipelines`] with the collaborators named in `settings`.
pub async fn build_from_settings(settings: &Settings) -> anyhow::Result<Pipelines> {
    let embedder: Arc<dyn Embedder> = Arc::from(docqa_embed::get_default_embedder(settings));
    let index = docqa_vector::open_index(settings).await?;
    let generator: Arc<dyn Generator> = Arc::new(OllamaGenerator::from_settings(settings));
    Ok(build_pipelines(settings, embedder, index, generator).await?)
}
