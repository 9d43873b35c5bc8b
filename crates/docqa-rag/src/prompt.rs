use docqa_core::types::{ScoredChunk, Turn};

const STUFF_HEADER: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CONDENSE_HEADER: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.";

/// Context blocks separated by blank lines, in retrieval order.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter().map(|h| h.chunk.content.trim()).collect::<Vec<_>>().join("\n\n")
}

pub fn format_history(history: &[Turn]) -> String {
    let mut out = String::new();
    for turn in history {
        out.push_str("Human: ");
        out.push_str(&turn.question);
        out.push_str("\nAssistant: ");
        out.push_str(&turn.answer);
        out.push('\n');
    }
    out
}

pub fn stuff_prompt(hits: &[ScoredChunk], question: &str) -> String {
    format!("{STUFF_HEADER}\n\n{}\n\nQuestion: {question}\nHelpful Answer:", format_context(hits))
}

pub fn condense_prompt(history: &[Turn], question: &str) -> String {
    format!(
        "{CONDENSE_HEADER}\n\nChat History:\n{}Follow Up Input: {question}\nStandalone question:",
        format_history(history)
    )
}

pub fn conversational_prompt(hits: &[ScoredChunk], history: &[Turn], question: &str) -> String {
    if history.is_empty() {
        return stuff_prompt(hits, question);
    }
    format!(
        "{STUFF_HEADER}\n\n{}\n\nChat History:\n{}\nQuestion: {question}\nHelpful Answer:",
        format_context(hits),
        format_history(history)
    )
}
