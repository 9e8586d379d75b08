use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use routey_core::config::LlmConfig;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    provider: &'static str,
    model: String,
    base_url: String,
    key_present: bool,
}

impl HealthState {
    pub fn from_config(llm: &LlmConfig) -> Self {
        Self {
            provider: llm.provider.as_str(),
            model: llm.model.clone(),
            base_url: llm.resolved_base_url().to_string(),
            key_present: llm.api_key.is_some(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub provider: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Readiness only reflects local configuration; the provider is never called.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let provider = provider_check(&state);
    let ready = provider.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "routey-server runtime initialized".to_string(),
        },
        provider,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn provider_check(state: &HealthState) -> HealthCheck {
    let target = format!("{} model `{}` at {}", state.provider, state.model, state.base_url);
    if state.provider == "openai" && !state.key_present {
        return HealthCheck { status: "degraded", detail: format!("{target}: api key missing") };
    }
    HealthCheck { status: "ready", detail: target }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use routey_core::config::{AppConfig, LlmProvider};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_configured_provider_and_model() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-test".to_string().into());

        let (status, Json(payload)) = health(State(HealthState::from_config(&config.llm))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert!(payload.provider.detail.contains("openai model `gpt-4o-mini`"));
        assert!(!payload.provider.detail.contains("sk-test"));
    }

    #[tokio::test]
    async fn health_is_degraded_when_openai_key_is_missing() {
        let config = AppConfig::default();

        let (status, Json(payload)) = health(State(HealthState::from_config(&config.llm))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.provider.status, "degraded");
    }

    #[tokio::test]
    async fn local_provider_is_ready_without_key() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;

        let (status, Json(payload)) = health(State(HealthState::from_config(&config.llm))).await;

        assert_eq!(status, StatusCode::OK);
        assert!(payload.provider.detail.contains("http://localhost:11434"));
    }
}
