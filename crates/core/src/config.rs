use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub agent: AgentConfig,
    pub classifier: ClassifierConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub max_auth_attempts: u32,
    pub idle_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_history: usize,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub collaborator_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierProvider {
    Disabled,
    #[serde(rename = "openai")]
    OpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub max_auth_attempts: Option<u32>,
    pub idle_timeout_secs: Option<u64>,
    pub classifier_provider: Option<ClassifierProvider>,
    pub classifier_model: Option<String>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                max_auth_attempts: 3,
                idle_timeout_secs: 300,
                sweep_interval_secs: 60,
                max_history: 10,
            },
            agent: AgentConfig { collaborator_timeout_secs: 10 },
            classifier: ClassifierConfig {
                provider: ClassifierProvider::Disabled,
                api_key: None,
                base_url: None,
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 8,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl AgentConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }
}

impl ClassifierConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != ClassifierProvider::Disabled
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ClassifierProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" => Ok(Self::Disabled),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported classifier provider `{other}` (expected disabled|openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vaulta.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(session) = patch.session {
            if let Some(max_auth_attempts) = session.max_auth_attempts {
                self.session.max_auth_attempts = max_auth_attempts;
            }
            if let Some(idle_timeout_secs) = session.idle_timeout_secs {
                self.session.idle_timeout_secs = idle_timeout_secs;
            }
            if let Some(sweep_interval_secs) = session.sweep_interval_secs {
                self.session.sweep_interval_secs = sweep_interval_secs;
            }
            if let Some(max_history) = session.max_history {
                self.session.max_history = max_history;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(collaborator_timeout_secs) = agent.collaborator_timeout_secs {
                self.agent.collaborator_timeout_secs = collaborator_timeout_secs;
            }
        }

        if let Some(classifier) = patch.classifier {
            if let Some(provider) = classifier.provider {
                self.classifier.provider = provider;
            }
            if let Some(classifier_api_key_value) = classifier.api_key {
                self.classifier.api_key = Some(secret_value(classifier_api_key_value));
            }
            if let Some(base_url) = classifier.base_url {
                self.classifier.base_url = Some(base_url);
            }
            if let Some(model) = classifier.model {
                self.classifier.model = model;
            }
            if let Some(timeout_secs) = classifier.timeout_secs {
                self.classifier.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VAULTA_SESSION_MAX_AUTH_ATTEMPTS") {
            self.session.max_auth_attempts =
                parse_u32("VAULTA_SESSION_MAX_AUTH_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("VAULTA_SESSION_IDLE_TIMEOUT_SECS") {
            self.session.idle_timeout_secs = parse_u64("VAULTA_SESSION_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VAULTA_SESSION_SWEEP_INTERVAL_SECS") {
            self.session.sweep_interval_secs =
                parse_u64("VAULTA_SESSION_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("VAULTA_SESSION_MAX_HISTORY") {
            self.session.max_history = parse_usize("VAULTA_SESSION_MAX_HISTORY", &value)?;
        }

        if let Some(value) = read_env("VAULTA_AGENT_COLLABORATOR_TIMEOUT_SECS") {
            self.agent.collaborator_timeout_secs =
                parse_u64("VAULTA_AGENT_COLLABORATOR_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VAULTA_CLASSIFIER_PROVIDER") {
            self.classifier.provider = value.parse()?;
        }
        if let Some(value) = read_env("VAULTA_CLASSIFIER_API_KEY") {
            self.classifier.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("VAULTA_CLASSIFIER_BASE_URL") {
            self.classifier.base_url = Some(value);
        }
        if let Some(value) = read_env("VAULTA_CLASSIFIER_MODEL") {
            self.classifier.model = value;
        }
        if let Some(value) = read_env("VAULTA_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_u64("VAULTA_CLASSIFIER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VAULTA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VAULTA_SERVER_PORT") {
            self.server.port = parse_u16("VAULTA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("VAULTA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("VAULTA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("VAULTA_LOGGING_LEVEL").or_else(|| read_env("VAULTA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VAULTA_LOGGING_FORMAT").or_else(|| read_env("VAULTA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(max_auth_attempts) = overrides.max_auth_attempts {
            self.session.max_auth_attempts = max_auth_attempts;
        }
        if let Some(idle_timeout_secs) = overrides.idle_timeout_secs {
            self.session.idle_timeout_secs = idle_timeout_secs;
        }
        if let Some(provider) = overrides.classifier_provider {
            self.classifier.provider = provider;
        }
        if let Some(model) = overrides.classifier_model {
            self.classifier.model = model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_session(&self.session)?;
        validate_agent(&self.agent)?;
        validate_classifier(&self.classifier)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("vaulta.toml"), PathBuf::from("config/vaulta.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_session(session: &SessionConfig) -> Result<(), ConfigError> {
    if session.max_auth_attempts == 0 || session.max_auth_attempts > 10 {
        return Err(ConfigError::Validation(
            "session.max_auth_attempts must be in range 1..=10".to_string(),
        ));
    }
    if session.idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "session.idle_timeout_secs must be greater than zero".to_string(),
        ));
    }
    if session.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "session.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    if session.max_history == 0 {
        return Err(ConfigError::Validation(
            "session.max_history must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.collaborator_timeout_secs == 0 || agent.collaborator_timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "agent.collaborator_timeout_secs must be in range 1..=120".to_string(),
        ));
    }
    Ok(())
}

fn validate_classifier(classifier: &ClassifierConfig) -> Result<(), ConfigError> {
    if classifier.timeout_secs == 0 || classifier.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "classifier.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    match classifier.provider {
        ClassifierProvider::Disabled => {}
        ClassifierProvider::OpenAi => {
            let missing = classifier
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "classifier.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        ClassifierProvider::Ollama => {
            let missing =
                classifier.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "classifier.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    if let Some(base_url) = &classifier.base_url {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "classifier.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    session: Option<SessionPatch>,
    agent: Option<AgentPatch>,
    classifier: Option<ClassifierPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    max_auth_attempts: Option<u32>,
    idle_timeout_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
    max_history: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    collaborator_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ClassifierPatch {
    provider: Option<ClassifierProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
