use std::sync::Arc;

use routey_agent::{IntentRouter, OpenAiCompatibleClient, PromptBuilder};
use routey_core::config::{AppConfig, LoadOptions};

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_PROVIDER};

pub fn run(query: &str) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "route",
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let client = match OpenAiCompatibleClient::from_config(&config.llm, &config.rag) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "route",
                "provider_init",
                error.to_string(),
                EXIT_PROVIDER,
            );
        }
    };
    let router = IntentRouter::new(
        Arc::new(client),
        PromptBuilder::new(config.llm.model.clone(), config.llm.temperature),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "route",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_PROVIDER,
            );
        }
    };

    match runtime.block_on(router.route(query)) {
        Ok(outcome) => {
            let response = match serde_json::to_value(outcome.to_response()) {
                Ok(response) => response,
                Err(error) => {
                    return CommandResult::failure(
                        "route",
                        "serialization",
                        error.to_string(),
                        EXIT_PROVIDER,
                    );
                }
            };
            CommandResult::success(
                "route",
                format!("query routed as {}", outcome.kind()),
                Some(response),
            )
        }
        Err(error) => CommandResult::failure("route", "provider", error.to_string(), EXIT_PROVIDER),
    }
}
