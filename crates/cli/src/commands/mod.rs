pub mod chat;
pub mod config;

use serde::Serialize;
use serde_json::Value;
use vaulta_core::config::ConfigError;

/// Exit code returned when configuration fails to load or validate.
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_IO: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn text(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn success(command: &str, message: impl Into<String>, details: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command,
            status: "ok",
            error_class: None,
            message: message.into(),
            details,
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
            details: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn config_failure(command: &str, error: &ConfigError) -> Self {
        Self::failure(command, "config_validation", format!("configuration issue: {error}"), EXIT_CONFIG)
    }
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
