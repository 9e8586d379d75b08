use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use routey_core::Document;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::llm::{ChatMessage, CompletionOptions, LlmClient, LlmError, ResponseFormat};

const ANSWER_INSTRUCTION: &str = r#"You are a helpful assistant. Answer using ONLY the provided context.
If the answer is not in the context, say "I don't know" briefly.

Return a SHORT answer for the user.
"#;

const MAX_SOURCES: usize = 3;
const PREVIEW_CHARS: usize = 160;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("text is required")]
    EmptyText,
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("embedder returned {got} vectors for {expected} inputs")]
    EmbeddingCount { expected: usize, got: usize },
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or replaces the document with the same id.
    async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<(), RagError>;
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<Document>, RagError>;
}

#[derive(Default)]
struct StoreInner {
    entries: Vec<(Document, Vec<f32>)>,
    id_map: HashMap<String, usize>,
    dimension: Option<usize>,
}

#[derive(Clone, Default)]
pub struct InMemoryVectorStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, document: Document, embedding: Vec<f32>) -> Result<(), RagError> {
        let mut inner = self.inner.write().await;
        match inner.dimension {
            Some(expected) if expected != embedding.len() => {
                return Err(RagError::DimensionMismatch { expected, got: embedding.len() });
            }
            None => inner.dimension = Some(embedding.len()),
            _ => {}
        }

        if let Some(&index) = inner.id_map.get(&document.id) {
            inner.entries[index] = (document, embedding);
        } else {
            let index = inner.entries.len();
            inner.id_map.insert(document.id.clone(), index);
            inner.entries.push((document, embedding));
        }
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<Document>, RagError> {
        let inner = self.inner.read().await;
        if let Some(expected) = inner.dimension {
            if expected != embedding.len() {
                return Err(RagError::DimensionMismatch { expected, got: embedding.len() });
            }
        }

        let mut scored = inner
            .entries
            .iter()
            .map(|(document, stored)| {
                let score = cosine_similarity(embedding, stored);
                (if score.is_nan() { f32::NEG_INFINITY } else { score }, document)
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored.into_iter().take(top_k).map(|(_, document)| document.clone()).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestReceipt {
    pub id: String,
    pub chars: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SourcePreview {
    pub preview: String,
    pub metadata: Map<String, Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourcePreview>,
}

#[derive(Clone, Debug)]
pub struct RagSettings {
    pub model: String,
    pub temperature: f32,
    pub default_top_k: usize,
    pub max_top_k: usize,
}

/// Single-shot retrieval answers: no JSON hint, no coercion, no retry.
#[derive(Clone)]
pub struct RagService {
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: RagSettings,
}

impl RagService {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: RagSettings,
    ) -> Self {
        Self { llm, embedder, store, settings }
    }

    pub async fn ingest(
        &self,
        id: Option<String>,
        text: &str,
        metadata: Map<String, Value>,
    ) -> Result<IngestReceipt, RagError> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyText);
        }

        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let embedding = self.embed_one(text).await?;
        self.store.add(Document::new(id.clone(), text, metadata), embedding).await?;

        let chars = text.chars().count();
        info!(event_name = "rag.document.ingested", doc_id = %id, chars, "document ingested");
        Ok(IngestReceipt { id, chars })
    }

    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<RagAnswer, RagError> {
        let top_k = self.clamp_top_k(top_k);
        let embedding = self.embed_one(question).await?;
        let documents = self.store.search(&embedding, top_k).await?;

        let context = documents
            .iter()
            .map(|document| format!("- {}", document.content))
            .collect::<Vec<_>>()
            .join("\n");
        let messages = [
            ChatMessage::system(ANSWER_INSTRUCTION),
            ChatMessage::user(format!("Question:\n{question}\n\nContext:\n{context}")),
        ];
        let options = CompletionOptions {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            response_format: ResponseFormat::Text,
        };

        let answer = self.llm.complete(&messages, &options).await?;
        info!(
            event_name = "rag.question.answered",
            top_k,
            retrieved = documents.len(),
            "question answered from context"
        );

        let sources = documents
            .iter()
            .take(MAX_SOURCES)
            .map(|document| SourcePreview {
                preview: document.preview(PREVIEW_CHARS),
                metadata: document.metadata.clone(),
            })
            .collect();
        Ok(RagAnswer { answer, sources })
    }

    fn clamp_top_k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.settings.default_top_k).clamp(1, self.settings.max_top_k.max(1))
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(RagError::EmbeddingCount { expected: 1, got: vectors.len() });
        }
        Ok(vectors.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use routey_core::Document;
    use serde_json::{json, Map};

    use super::{
        Embedder, InMemoryVectorStore, RagError, RagService, RagSettings, VectorStore,
        MAX_SOURCES,
    };
    use crate::llm::{ChatMessage, CompletionOptions, LlmClient, LlmError, ResponseFormat};

    /// Maps each text onto keyword counts so similarity is predictable.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let text = text.to_ascii_lowercase();
                    ["database", "cache", "latency"]
                        .iter()
                        .map(|keyword| text.matches(keyword).count() as f32 + 0.01)
                        .collect()
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingLlm {
        calls: Mutex<Vec<(Vec<ChatMessage>, CompletionOptions)>>,
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            options: &CompletionOptions,
        ) -> Result<String, LlmError> {
            self.calls.lock().expect("calls lock").push((messages.to_vec(), options.clone()));
            Ok("Increase the pool size.".to_string())
        }
    }

    fn service(llm: Arc<RecordingLlm>, store: InMemoryVectorStore) -> RagService {
        RagService::new(
            llm,
            Arc::new(KeywordEmbedder),
            Arc::new(store),
            RagSettings {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.2,
                default_top_k: 3,
                max_top_k: 8,
            },
        )
    }

    #[tokio::test]
    async fn ingest_rejects_blank_text() {
        let rag = service(Arc::default(), InMemoryVectorStore::new());

        let result = rag.ingest(Some("doc".to_string()), "   ", Map::new()).await;

        assert!(matches!(result, Err(RagError::EmptyText)));
    }

    #[tokio::test]
    async fn ingest_assigns_uuid_when_id_missing_and_counts_chars() {
        let store = InMemoryVectorStore::new();
        let rag = service(Arc::default(), store.clone());

        let receipt = rag.ingest(None, "cache héavy", Map::new()).await.expect("ingest");

        assert_eq!(receipt.chars, 11);
        assert_eq!(receipt.id.len(), 36);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn ingest_with_same_id_replaces_document() {
        let store = InMemoryVectorStore::new();
        let rag = service(Arc::default(), store.clone());

        let id = || Some("runbook-1".to_string());
        rag.ingest(id(), "database tips", Map::new()).await.expect("first");
        rag.ingest(id(), "cache tips", Map::new()).await.expect("second");

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn ask_puts_most_similar_context_first_and_limits_sources() {
        let llm = Arc::new(RecordingLlm::default());
        let rag = service(llm.clone(), InMemoryVectorStore::new());
        let mut meta = Map::new();
        meta.insert("tag".to_string(), json!("runbook"));

        rag.ingest(Some("db".into()), "database database pool sizing", meta).await.expect("ingest");
        rag.ingest(Some("cache".into()), "cache warmup", Map::new()).await.expect("ingest");
        rag.ingest(Some("lat".into()), "latency budget", Map::new()).await.expect("ingest");
        rag.ingest(Some("lat2".into()), "latency dashboards", Map::new()).await.expect("ingest");

        let answer = rag.ask("which database settings?", Some(4)).await.expect("ask");

        assert_eq!(answer.answer, "Increase the pool size.");
        assert_eq!(answer.sources.len(), MAX_SOURCES);
        assert_eq!(answer.sources[0].preview, "database database pool sizing");
        assert_eq!(answer.sources[0].metadata["docId"], json!("db"));
        assert_eq!(answer.sources[0].metadata["tag"], json!("runbook"));

        let calls = llm.calls.lock().expect("calls lock");
        let (messages, options) = &calls[0];
        assert_eq!(options.response_format, ResponseFormat::Text);
        assert!(messages[0].content.contains("ONLY the provided context"));
        let expected_prefix =
            "Question:\nwhich database settings?\n\nContext:\n- database database pool sizing";
        assert!(messages[1].content.starts_with(expected_prefix));
    }

    #[tokio::test]
    async fn top_k_is_clamped_to_configured_bounds() {
        let rag = service(Arc::default(), InMemoryVectorStore::new());

        assert_eq!(rag.clamp_top_k(None), 3);
        assert_eq!(rag.clamp_top_k(Some(0)), 1);
        assert_eq!(rag.clamp_top_k(Some(50)), 8);
        assert_eq!(rag.clamp_top_k(Some(5)), 5);
    }

    #[tokio::test]
    async fn store_rejects_dimension_mismatch() {
        let store = InMemoryVectorStore::new();
        store.add(Document::new("a", "one", Map::new()), vec![1.0, 0.0]).await.expect("add");

        let added = store.add(Document::new("b", "two", Map::new()), vec![1.0]).await;
        let searched = store.search(&[1.0, 0.0, 0.0], 1).await;

        assert!(matches!(added, Err(RagError::DimensionMismatch { expected: 2, got: 1 })));
        assert!(matches!(searched, Err(RagError::DimensionMismatch { expected: 2, got: 3 })));
    }

    #[tokio::test]
    async fn search_on_empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new();

        let found = store.search(&[1.0, 0.0], 3).await.expect("search");

        assert!(found.is_empty());
        assert!(store.is_empty().await);
    }
}
