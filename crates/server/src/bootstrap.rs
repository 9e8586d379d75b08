use std::sync::Arc;

use routey_agent::{
    Embedder, InMemoryVectorStore, IntentRouter, LlmClient, LlmError, OpenAiCompatibleClient,
    PromptBuilder, RagService, RagSettings,
};
use routey_core::config::AppConfig;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub router: IntentRouter,
    pub rag: RagService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("completion provider client could not be built: {0}")]
    Provider(#[source] LlmError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let client = Arc::new(
        OpenAiCompatibleClient::from_config(&config.llm, &config.rag)
            .map_err(BootstrapError::Provider)?,
    );
    info!(
        event_name = "system.bootstrap.provider_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        base_url = config.llm.resolved_base_url(),
        "completion provider client initialized"
    );

    let llm: Arc<dyn LlmClient> = client.clone();
    let embedder: Arc<dyn Embedder> = client;
    Ok(assemble(config, llm, embedder))
}

/// Wires router and retrieval over the given provider seams.
pub fn assemble(
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    embedder: Arc<dyn Embedder>,
) -> Application {
    let router = IntentRouter::new(
        llm.clone(),
        PromptBuilder::new(config.llm.model.clone(), config.llm.temperature),
    );
    let rag = RagService::new(
        llm,
        embedder,
        Arc::new(InMemoryVectorStore::new()),
        RagSettings {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            default_top_k: config.rag.default_top_k,
            max_top_k: config.rag.max_top_k,
        },
    );

    Application { config, router, rag }
}
