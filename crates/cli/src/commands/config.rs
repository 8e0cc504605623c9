use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use vaulta_core::config::{AppConfig, ClassifierProvider, LoadOptions, LogFormat};

use crate::commands::CommandResult;

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

pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        config_path: config_path.clone(),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", &error),
    };

    let config_file_path = detect_config_path(config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult::text(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let session = &config.session;
    let classifier = &config.classifier;
    let server = &config.server;

    vec![
        Field::new(
            "session.max_auth_attempts",
            session.max_auth_attempts,
            &["VAULTA_SESSION_MAX_AUTH_ATTEMPTS"],
        ),
        Field::new(
            "session.idle_timeout_secs",
            session.idle_timeout_secs,
            &["VAULTA_SESSION_IDLE_TIMEOUT_SECS"],
        ),
        Field::new(
            "session.sweep_interval_secs",
            session.sweep_interval_secs,
            &["VAULTA_SESSION_SWEEP_INTERVAL_SECS"],
        ),
        Field::new("session.max_history", session.max_history, &["VAULTA_SESSION_MAX_HISTORY"]),
        Field::new(
            "agent.collaborator_timeout_secs",
            config.agent.collaborator_timeout_secs,
            &["VAULTA_AGENT_COLLABORATOR_TIMEOUT_SECS"],
        ),
        Field::new(
            "classifier.provider",
            provider_label(classifier.provider),
            &["VAULTA_CLASSIFIER_PROVIDER"],
        ),
        Field::new("classifier.model", &classifier.model, &["VAULTA_CLASSIFIER_MODEL"]),
        Field::new(
            "classifier.base_url",
            classifier.base_url.as_deref().unwrap_or("<unset>"),
            &["VAULTA_CLASSIFIER_BASE_URL"],
        ),
        Field::new(
            "classifier.api_key",
            redact_secret(classifier.api_key.as_ref().map(|key| key.expose_secret())),
            &["VAULTA_CLASSIFIER_API_KEY"],
        ),
        Field::new(
            "classifier.timeout_secs",
            classifier.timeout_secs,
            &["VAULTA_CLASSIFIER_TIMEOUT_SECS"],
        ),
        Field::new("server.bind_address", &server.bind_address, &["VAULTA_SERVER_BIND_ADDRESS"]),
        Field::new("server.port", server.port, &["VAULTA_SERVER_PORT"]),
        Field::new(
            "server.graceful_shutdown_secs",
            server.graceful_shutdown_secs,
            &["VAULTA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        Field::new(
            "logging.level",
            &config.logging.level,
            &["VAULTA_LOGGING_LEVEL", "VAULTA_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format_label(config.logging.format),
            &["VAULTA_LOGGING_FORMAT", "VAULTA_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("vaulta.toml"), PathBuf::from("config/vaulta.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
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

fn provider_label(provider: ClassifierProvider) -> &'static str {
    match provider {
        ClassifierProvider::Disabled => "disabled",
        ClassifierProvider::OpenAi => "openai",
        ClassifierProvider::Ollama => "ollama",
    }
}

fn format_label(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

/// Keeps a recognizable key prefix (`sk-***`) and drops the rest.
fn redact_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.map(str::trim) else {
        return "<unset>".to_string();
    };
    if secret.is_empty() {
        return "<empty>".to_string();
    }
    if let Some((prefix, _)) = secret.split_once('-') {
        return format!("{prefix}-***");
    }
    "<redacted>".to_string()
}
