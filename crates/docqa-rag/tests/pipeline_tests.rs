use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use docqa_core::config::Settings;
use docqa_core::error::{Error, Result};
use docqa_core::traits::{Embedder, Generator, VectorIndex};
use docqa_core::types::{DocumentChunk, ScoredChunk, Turn};
use docqa_embed::FakeEmbedder;
use docqa_rag::{build_pipelines, index_chunks, ConversationalRetrieval, Retriever, NO_CONTEXT_ANSWER};
use docqa_vector::MemoryIndex;

/// Fake embedder that records every text it is asked to embed.
struct RecordingEmbedder {
    inner: FakeEmbedder,
    batches: AtomicUsize,
    texts: Mutex<Vec<String>>,
}

impl RecordingEmbedder {
    fn new() -> Self {
        Self { inner: FakeEmbedder::new(256), batches: AtomicUsize::new(0), texts: Mutex::new(Vec::new()) }
    }

    fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn last_text(&self) -> Option<String> {
        self.texts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    fn model_id(&self) -> &str {
        "recording"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().unwrap().extend(texts.iter().cloned());
        self.inner.embed_batch(texts).await
    }
}

/// Memory index that counts how often its size is looked up.
struct CountingIndex {
    inner: MemoryIndex,
    len_calls: AtomicUsize,
}

#[async_trait]
impl VectorIndex for CountingIndex {
    async fn add(&self, chunks: &[DocumentChunk], vectors: &[Vec<f32>]) -> Result<()> {
        self.inner.add(chunks, vectors).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.inner.query(vector, k).await
    }

    async fn len(&self) -> Result<usize> {
        self.len_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.len().await
    }
}

enum Behaviour {
    Answer { condensed: String, answer: String },
    Fail,
    Hang,
}

struct ScriptedGenerator {
    behaviour: Behaviour,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn answering(condensed: &str, answer: &str) -> Self {
        Self::with(Behaviour::Answer { condensed: condensed.into(), answer: answer.into() })
    }

    fn with(behaviour: Behaviour) -> Self {
        Self { behaviour, prompts: Mutex::new(Vec::new()) }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.behaviour {
            Behaviour::Answer { condensed, answer } => {
                if prompt.ends_with("Standalone question:") {
                    Ok(condensed.clone())
                } else {
                    Ok(answer.clone())
                }
            }
            Behaviour::Fail => Err(Error::Generation("model offline".into())),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("late".into())
            }
        }
    }
}

fn write_corpus(dir: &TempDir) {
    fs::write(dir.path().join("water.txt"), "Store water in food grade barrels away from sunlight.").unwrap();
    fs::write(dir.path().join("fire.txt"), "Start a fire with dry tinder, kindling and a ferro rod.").unwrap();
    fs::write(dir.path().join("chickens.txt"), "Chickens need a predator proof coop and fresh water daily.").unwrap();
}

fn settings_for(dir: &TempDir) -> Settings {
    let mut settings = Settings::default();
    settings.documents.dir = dir.path().to_string_lossy().into_owned();
    settings.rag.top_k = 2;
    settings
}

#[tokio::test]
async fn startup_indexes_every_document() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let embedder = Arc::new(RecordingEmbedder::new());
    let index = Arc::new(MemoryIndex::new());
    let generator = Arc::new(ScriptedGenerator::answering("", "Use a ferro rod."));

    let pipelines = build_pipelines(&settings_for(&dir), embedder.clone(), index.clone(), generator.clone())
        .await
        .expect("startup");
    assert_eq!(pipelines.chunks, 3);
    assert_eq!(index.len().await.unwrap(), 3);

    let (answer, sources) = pipelines.retrieval_qa.answer_with_sources("how to start a fire with tinder").await.unwrap();
    assert_eq!(answer, "Use a ferro rod.");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].chunk.doc_id, "fire.txt");

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("dry tinder, kindling"));
    assert!(prompts[0].contains("Question: how to start a fire with tinder"));
}

#[tokio::test]
async fn follow_up_is_condensed_for_retrieval_and_history_reaches_prompt() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let embedder = Arc::new(RecordingEmbedder::new());
    let generator = Arc::new(ScriptedGenerator::answering("How often do chickens need fresh water?", "Daily."));
    let pipelines = build_pipelines(&settings_for(&dir), embedder.clone(), Arc::new(MemoryIndex::new()), generator.clone())
        .await
        .unwrap();

    let history = vec![Turn { question: "What do chickens need?".into(), answer: "A safe coop.".into() }];
    let answer = pipelines.conversational.answer("And how often water?", &history).await.unwrap();
    assert_eq!(answer, "Daily.");

    assert_eq!(embedder.last_text().as_deref(), Some("How often do chickens need fresh water?"));
    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Human: What do chickens need?"));
    assert!(prompts[0].contains("Follow Up Input: And how often water?"));
    assert!(prompts[1].contains("Human: What do chickens need?\nAssistant: A safe coop."));
    assert!(prompts[1].contains("Question: And how often water?"));
    assert!(prompts[1].contains("predator proof coop"));
}

#[tokio::test]
async fn condensing_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let mut settings = settings_for(&dir);
    settings.rag.condense_question = false;
    let embedder = Arc::new(RecordingEmbedder::new());
    let generator = Arc::new(ScriptedGenerator::answering("unused", "ok"));
    let pipelines = build_pipelines(&settings, embedder.clone(), Arc::new(MemoryIndex::new()), generator.clone())
        .await
        .unwrap();

    let history = vec![Turn { question: "q1".into(), answer: "a1".into() }];
    pipelines.conversational.answer("fire?", &history).await.unwrap();
    assert_eq!(generator.prompts().len(), 1);
    assert_eq!(embedder.last_text().as_deref(), Some("fire?"));
}

#[tokio::test]
async fn blank_condensed_question_falls_back_to_original() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let embedder = Arc::new(RecordingEmbedder::new());
    let generator = Arc::new(ScriptedGenerator::answering("   ", "ok"));
    let pipelines = build_pipelines(&settings_for(&dir), embedder.clone(), Arc::new(MemoryIndex::new()), generator)
        .await
        .unwrap();

    let history = vec![Turn { question: "q1".into(), answer: "a1".into() }];
    pipelines.conversational.answer("barrels?", &history).await.unwrap();
    assert_eq!(embedder.last_text().as_deref(), Some("barrels?"));
}

#[tokio::test]
async fn empty_directory_answers_without_calling_models() {
    let dir = TempDir::new().unwrap();
    let embedder = Arc::new(RecordingEmbedder::new());
    let generator = Arc::new(ScriptedGenerator::answering("", "should not be used"));
    let pipelines = build_pipelines(&settings_for(&dir), embedder.clone(), Arc::new(MemoryIndex::new()), generator.clone())
        .await
        .expect("empty directory is not an error");
    assert_eq!(pipelines.chunks, 0);

    let history = vec![Turn { question: "q".into(), answer: "a".into() }];
    let answer = pipelines.conversational.answer("anything?", &history).await.unwrap();
    assert_eq!(answer, NO_CONTEXT_ANSWER);
    assert_eq!(pipelines.retrieval_qa.answer("anything?").await.unwrap(), NO_CONTEXT_ANSWER);
    assert_eq!(embedder.batches(), 0);
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn missing_directory_fails_startup() {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::default();
    settings.documents.dir = dir.path().join("nope").to_string_lossy().into_owned();
    let result = build_pipelines(
        &settings,
        Arc::new(RecordingEmbedder::new()),
        Arc::new(MemoryIndex::new()),
        Arc::new(ScriptedGenerator::answering("", "")),
    )
    .await;
    assert!(matches!(result, Err(Error::Load { .. })));
}

#[tokio::test]
async fn generation_failure_propagates() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let pipelines = build_pipelines(
        &settings_for(&dir),
        Arc::new(RecordingEmbedder::new()),
        Arc::new(MemoryIndex::new()),
        Arc::new(ScriptedGenerator::with(Behaviour::Fail)),
    )
    .await
    .unwrap();

    let err = pipelines.conversational.answer("fire?", &[]).await.unwrap_err();
    assert!(err.to_string().contains("model offline"), "{err}");
    assert!(err.is_upstream());
}

#[tokio::test]
async fn hung_generator_times_out() {
    let embedder: Arc<dyn Embedder> = Arc::new(RecordingEmbedder::new());
    let index = Arc::new(MemoryIndex::new());
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let chunks = docqa_core::data_processor::DataProcessor::new(&Default::default())
        .unwrap()
        .process_directory(dir.path())
        .unwrap();
    index_chunks(embedder.as_ref(), index.as_ref(), &chunks, 8, Duration::from_secs(5)).await.unwrap();

    let timeout = Duration::from_millis(100);
    let retriever = Retriever::new(embedder, index, 2, timeout);
    let pipeline = ConversationalRetrieval::new(retriever, Arc::new(ScriptedGenerator::with(Behaviour::Hang)), true, timeout);

    match pipeline.answer("fire?", &[]).await {
        Err(Error::Timeout { stage, after }) => {
            assert_eq!(stage, "generation");
            assert_eq!(after, timeout);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn chunks_are_embedded_in_batches() {
    let dir = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("{i}.txt")), format!("note number {i}")).unwrap();
    }
    let mut settings = settings_for(&dir);
    settings.embedding.batch_size = 2;
    let embedder = Arc::new(RecordingEmbedder::new());
    let pipelines = build_pipelines(&settings, embedder.clone(), Arc::new(MemoryIndex::new()), Arc::new(ScriptedGenerator::answering("", "")))
        .await
        .unwrap();
    assert_eq!(pipelines.chunks, 5);
    assert_eq!(embedder.batches(), 3);
}

#[tokio::test]
async fn index_size_is_looked_up_once_across_queries() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir);
    let index = Arc::new(CountingIndex { inner: MemoryIndex::new(), len_calls: AtomicUsize::new(0) });
    let pipelines = build_pipelines(
        &settings_for(&dir),
        Arc::new(RecordingEmbedder::new()),
        index.clone(),
        Arc::new(ScriptedGenerator::answering("", "ok")),
    )
    .await
    .unwrap();

    for question in ["fire?", "water?", "chickens?"] {
        pipelines.conversational.answer(question, &[]).await.unwrap();
    }
    pipelines.retrieval_qa.answer("fire?").await.unwrap();
    assert_eq!(index.len_calls.load(Ordering::SeqCst), 1);
}
