use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use docqa_core::error::Result;
use docqa_core::traits::Generator;
use docqa_core::types::{ScoredChunk, Turn};

use crate::prompt;
use crate::retriever::Retriever;
use crate::with_timeout;

/// Returned when nothing was indexed at startup.
pub const NO_CONTEXT_ANSWER: &str = "I could not find any indexed documents to answer from.";

/// Single-shot question answering: retrieve, stuff the context into one prompt, generate.
#[derive(Clone)]
pub struct RetrievalQa {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    call_timeout: Duration,
}

impl RetrievalQa {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, call_timeout: Duration) -> Self {
        Self { retriever, generator, call_timeout }
    }

    /// Answer `question` and return the chunks the answer was grounded on.
    pub async fn answer_with_sources(&self, question: &str) -> Result<(String, Vec<ScoredChunk>)> {
        if self.retriever.is_empty().await? {
            return Ok((NO_CONTEXT_ANSWER.to_string(), vec![]));
        }
        let hits = self.retriever.retrieve(question).await?;
        let prompt = prompt::stuff_prompt(&hits, question);
        let answer = with_timeout("generation", self.call_timeout, self.generator.generate(&prompt)).await?;
        Ok((answer, hits))
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        Ok(self.answer_with_sources(question).await?.0)
    }
}

/// History-aware question answering. Holds no conversation state of its own.
#[derive(Clone)]
pub struct ConversationalRetrieval {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    condense_question: bool,
    call_timeout: Duration,
}

impl ConversationalRetrieval {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, condense_question: bool, call_timeout: Duration) -> Self {
        Self { retriever, generator, condense_question, call_timeout }
    }

    pub async fn answer(&self, question: &str, history: &[Turn]) -> Result<String> {
        if self.retriever.is_empty().await? {
            info!("index is empty, answering without context");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        let standalone = self.standalone_question(question, history).await?;
        let hits = self.retriever.retrieve(&standalone).await?;
        let prompt = prompt::conversational_prompt(&hits, history, question);
        let answer = with_timeout("generation", self.call_timeout, self.generator.generate(&prompt)).await?;
        debug!(history_turns = history.len(), context_chunks = hits.len(), "answered question");
        Ok(answer)
    }

    /// Rephrase a follow-up into a question that stands without the history.
    /// Used for retrieval only; falls back to `question` on an empty rephrasing.
    async fn standalone_question(&self, question: &str, history: &[Turn]) -> Result<String> {
        if history.is_empty() || !self.condense_question {
            return Ok(question.to_string());
        }
        let prompt = prompt::condense_prompt(history, question);
        let condensed = with_timeout("question condensing", self.call_timeout, self.generator.generate(&prompt)).await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            return Ok(question.to_string());
        }
        debug!(original = question, standalone = condensed, "condensed follow-up question");
        Ok(condensed.to_string())
    }
}
