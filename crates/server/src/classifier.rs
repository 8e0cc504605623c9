//! HTTP-backed intent classifier for OpenAI-compatible and Ollama chat
//! endpoints. Only the fixed flow labels are accepted from the model; any
//! other answer leaves the utterance unclassified.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::debug;
use vaulta_agent::prompts::CLASSIFIER_SYSTEM_PROMPT;
use vaulta_agent::IntentClassifier;
use vaulta_core::config::{ClassifierConfig, ClassifierProvider};
use vaulta_core::FlowCategory;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct HttpIntentClassifier {
    client: Client,
    provider: ClassifierProvider,
    endpoint: String,
    api_key: Option<SecretString>,
    model: String,
}

impl HttpIntentClassifier {
    /// Builds a classifier for the configured provider, or `None` when
    /// classification is disabled.
    pub fn from_config(config: &ClassifierConfig) -> Result<Option<Self>, reqwest::Error> {
        let Some(endpoint) = endpoint(config) else {
            return Ok(None);
        };
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Some(Self {
            client,
            provider: config.provider,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, utterance: &str) -> Value {
        let messages = json!([
            { "role": "system", "content": CLASSIFIER_SYSTEM_PROMPT },
            { "role": "user", "content": utterance },
        ]);
        match self.provider {
            ClassifierProvider::Ollama => json!({
                "model": self.model,
                "messages": messages,
                "stream": false,
                "options": { "temperature": 0 },
            }),
            _ => json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0,
                "max_tokens": 10,
            }),
        }
    }
}

#[async_trait]
impl IntentClassifier for HttpIntentClassifier {
    async fn classify_intent(&self, utterance: &str) -> Result<Option<FlowCategory>> {
        let mut request = self.client.post(&self.endpoint).json(&self.request_body(utterance));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("classifier endpoint returned {}", response.status()));
        }

        let payload: Value = response.json().await?;
        let label = parse_label(self.provider, &payload);
        debug!(
            event_name = "classifier.response",
            provider = ?self.provider,
            label = label.map(FlowCategory::label).unwrap_or("none"),
            "intent classifier answered"
        );
        Ok(label)
    }
}

fn endpoint(config: &ClassifierConfig) -> Option<String> {
    let base = config.base_url.as_deref().map(|url| url.trim_end_matches('/'));
    match config.provider {
        ClassifierProvider::Disabled => None,
        ClassifierProvider::OpenAi => {
            Some(format!("{}/chat/completions", base.unwrap_or(OPENAI_BASE_URL)))
        }
        ClassifierProvider::Ollama => base.map(|base| format!("{base}/api/chat")),
    }
}

fn parse_label(provider: ClassifierProvider, payload: &Value) -> Option<FlowCategory> {
    let content = match provider {
        ClassifierProvider::Ollama => payload.pointer("/message/content"),
        _ => payload.pointer("/choices/0/message/content"),
    }?;
    FlowCategory::find_in_text(content.as_str()?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vaulta_core::config::{ClassifierConfig, ClassifierProvider};
    use vaulta_core::FlowCategory;

    use super::{parse_label, HttpIntentClassifier};

    fn config(provider: ClassifierProvider, base_url: Option<&str>) -> ClassifierConfig {
        ClassifierConfig {
            provider,
            api_key: Some("sk-test".to_string().into()),
            base_url: base_url.map(str::to_string),
            model: "test-model".to_string(),
            timeout_secs: 2,
        }
    }

    #[test]
    fn disabled_provider_builds_nothing() {
        let classifier =
            HttpIntentClassifier::from_config(&config(ClassifierProvider::Disabled, None))
                .expect("client");
        assert!(classifier.is_none());
    }

    #[test]
    fn endpoints_follow_the_provider_conventions() {
        let openai = HttpIntentClassifier::from_config(&config(ClassifierProvider::OpenAi, None))
            .expect("client")
            .expect("enabled");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        let ollama = HttpIntentClassifier::from_config(&config(
            ClassifierProvider::Ollama,
            Some("http://localhost:11434/"),
        ))
        .expect("client")
        .expect("enabled");
        assert_eq!(ollama.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn only_known_labels_are_accepted() {
        let openai = json!({ "choices": [{ "message": { "content": "transfers" } }] });
        assert_eq!(parse_label(ClassifierProvider::OpenAi, &openai), Some(FlowCategory::Transfers));

        let ollama = json!({ "message": { "content": "Category: card_issues" } });
        assert_eq!(parse_label(ClassifierProvider::Ollama, &ollama), Some(FlowCategory::CardIssues));

        let invented = json!({ "choices": [{ "message": { "content": "mortgages" } }] });
        assert_eq!(parse_label(ClassifierProvider::OpenAi, &invented), None);
        assert_eq!(parse_label(ClassifierProvider::OpenAi, &json!({})), None);
    }
}
