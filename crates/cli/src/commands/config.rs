use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use routey_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = SourceResolver { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let api_key = match &config.llm.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };
    let base_url = match &config.llm.base_url {
        Some(base_url) => base_url.clone(),
        None => format!("{} (provider default)", config.llm.resolved_base_url()),
    };

    let fields: [(&str, String, &[&str]); 13] = [
        ("llm.provider", config.llm.provider.as_str().to_string(), &["ROUTEY_LLM_PROVIDER"]),
        ("llm.model", config.llm.model.clone(), &["ROUTEY_LLM_MODEL"]),
        ("llm.base_url", base_url, &["ROUTEY_LLM_BASE_URL"]),
        ("llm.api_key", api_key, &["ROUTEY_LLM_API_KEY"]),
        ("llm.temperature", config.llm.temperature.to_string(), &["ROUTEY_LLM_TEMPERATURE"]),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["ROUTEY_LLM_TIMEOUT_SECS"]),
        (
            "rag.embedding_model",
            config.rag.embedding_model.clone(),
            &["ROUTEY_RAG_EMBEDDING_MODEL"],
        ),
        ("rag.default_top_k", config.rag.default_top_k.to_string(), &["ROUTEY_RAG_DEFAULT_TOP_K"]),
        ("rag.max_top_k", config.rag.max_top_k.to_string(), &["ROUTEY_RAG_MAX_TOP_K"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            &["ROUTEY_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), &["ROUTEY_SERVER_PORT"]),
        (
            "logging.level",
            config.logging.level.clone(),
            &["ROUTEY_LOGGING_LEVEL", "ROUTEY_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["ROUTEY_LOGGING_FORMAT", "ROUTEY_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in fields {
        lines.push(format!("- {key} = {value} (source: {})", sources.source_of(key, env_keys)));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

struct SourceResolver<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

impl SourceResolver<'_> {
    fn source_of(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if self.file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
            let file_path = self
                .file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    ["routey.toml", "config/routey.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a recognisable prefix such as `sk-` and hides the rest.
fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
