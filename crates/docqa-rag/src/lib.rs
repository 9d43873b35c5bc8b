//! Retrieval-augmented answering over a vector index.
//!
//! [`RetrievalQa`] answers a single question from retrieved context.
//! [`ConversationalRetrieval`] additionally folds caller-supplied history into
//! both retrieval (via a condensed standalone question) and the answer prompt.
//! [`startup`] loads the document directory and builds both pipelines.

use std::future::Future;
use std::time::Duration;

use docqa_core::error::{Error, Result};

pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod startup;

pub use pipeline::{ConversationalRetrieval, RetrievalQa, NO_CONTEXT_ANSWER};
pub use retriever::Retriever;
pub use startup::{build_from_settings, build_pipelines, index_chunks, Pipelines};

/// Run `fut`, failing with [`Error::Timeout`] if it does not finish within `after`.
pub(crate) async fn with_timeout<T, F>(stage: &'static str, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(after, fut).await.map_err(|_| Error::Timeout { stage, after })?
}
