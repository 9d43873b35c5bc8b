//! Domain types shared by the loader, the indexes and the answer pipelines.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A file read from the document directory.
///
/// - `source`: path of the file as it was found on disk
/// - `doc_id`: path relative to the document root, stable across restarts
/// - `text`: decoded file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub doc_id: String,
    pub text: String,
}

/// A contiguous span of a document, the unit of retrieval.
///
/// - `id`: `"{doc_id}#{chunk_index}"`
/// - `start_offset`: byte offset of `content` inside the parent document
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub source: String,
    pub content: String,
    pub start_offset: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A chunk returned by a vector index. Higher `score` is always better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// One prior question/answer exchange supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}
