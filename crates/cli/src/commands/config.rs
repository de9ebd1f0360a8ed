use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use procura_core::config::{AppConfig, LoadOptions};
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(key: &'static str, value: impl ToString, env_keys: &'static [&'static str]) -> Self {
        Self { key, value: value.to_string(), env_keys }
    }
}

pub fn run(options: LoadOptions) -> String {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source =
            field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let assistant = &config.assistant;
    let api_key = if config.llm.has_api_key() { "<redacted>" } else { "<unset>" };

    vec![
        Field::new("database.url", &config.database.url, &["PROCURA_DATABASE_URL"]),
        Field::new(
            "database.max_connections",
            config.database.max_connections,
            &["PROCURA_DATABASE_MAX_CONNECTIONS"],
        ),
        Field::new(
            "database.timeout_secs",
            config.database.timeout_secs,
            &["PROCURA_DATABASE_TIMEOUT_SECS"],
        ),
        Field::new("llm.api_key", api_key, &["PROCURA_LLM_API_KEY", "GEMINI_API_KEY"]),
        Field::new("llm.base_url", &config.llm.base_url, &["PROCURA_LLM_BASE_URL"]),
        Field::new("llm.model", &config.llm.model, &["PROCURA_LLM_MODEL"]),
        Field::new("llm.timeout_secs", config.llm.timeout_secs, &["PROCURA_LLM_TIMEOUT_SECS"]),
        Field::new(
            "assistant.primary_attempts",
            assistant.primary_attempts,
            &["PROCURA_ASSISTANT_PRIMARY_ATTEMPTS"],
        ),
        Field::new("assistant.primary_delay_ms", assistant.primary_delay_ms, &[]),
        Field::new(
            "assistant.follow_up_attempts",
            assistant.follow_up_attempts,
            &["PROCURA_ASSISTANT_FOLLOW_UP_ATTEMPTS"],
        ),
        Field::new("assistant.follow_up_base_delay_ms", assistant.follow_up_base_delay_ms, &[]),
        Field::new(
            "assistant.max_message_chars",
            assistant.max_message_chars,
            &["PROCURA_ASSISTANT_MAX_MESSAGE_CHARS"],
        ),
        Field::new(
            "assistant.max_records_per_response",
            assistant.max_records_per_response,
            &["PROCURA_ASSISTANT_MAX_RECORDS_PER_RESPONSE"],
        ),
        Field::new("assistant.price_list_default_limit", assistant.price_list_default_limit, &[]),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["PROCURA_LOGGING_LEVEL", "PROCURA_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["PROCURA_LOGGING_FORMAT", "PROCURA_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    ["procura.toml", "config/procura.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, config_file_doc: Option<&Value>, config_file_path: Option<&Path>) -> String {
    let from_env = field
        .env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = from_env {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
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

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_found_in_the_config_document() {
        let doc: toml::Value = "[llm]\nmodel = \"gemini-2.0-flash\"\n".parse().expect("toml");

        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "database.url"));
    }
}
