use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// Ask the provider to force a single JSON object. Providers that ignore
    /// the hint still go through coercion.
    JsonObject,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion provider request failed: {0}")]
    Transport(String),
    #[error("completion provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion provider response could not be decoded: {0}")]
    Decode(String),
}

/// A completion either yields text or fails outright; partial output is
/// never surfaced.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, LlmError>;
}
