//! Agent Runtime - LLM-backed intent routing and retrieval-augmented answers
//!
//! This crate turns a free-text query into either a structured payment-hold
//! action or a plain answer:
//! - Builds few-shot and strict prompts for the completion provider (`prompt`)
//! - Recovers one JSON object from unreliable model output (`coercion`)
//! - Runs the two-attempt call/coerce protocol and validates the result (`router`)
//! - Answers questions from ingested documents (`rag`)
//!
//! # Architecture
//!
//! The router is a fixed sequence, not a retry loop:
//! 1. **Primary attempt** - system instruction + two examples + the query
//! 2. **Strict attempt** - only when the first output cannot be coerced
//! 3. **Fallback** - the best raw text, fence-stripped and truncated
//!
//! # Key Types
//!
//! - `IntentRouter` - orchestrator (see `router` module)
//! - `LlmClient` - pluggable completion provider (see `llm`, `openai`)
//! - `RagService` - ingest and ask over an in-memory vector store
//!
//! # Safety Principle
//!
//! The LLM is strictly a translator. A hold is only produced when the model
//! returned a non-blank invoice id and an amount that parses as a decimal.

pub mod coercion;
pub mod llm;
pub mod openai;
pub mod prompt;
pub mod rag;
pub mod router;

pub use llm::{ChatMessage, CompletionOptions, LlmClient, LlmError, ResponseFormat, Role};
pub use openai::OpenAiCompatibleClient;
pub use prompt::{PromptBuilder, PromptSpec};
pub use rag::{
    Embedder, IngestReceipt, InMemoryVectorStore, RagAnswer, RagError, RagService, RagSettings,
    SourcePreview, VectorStore,
};
pub use router::IntentRouter;
