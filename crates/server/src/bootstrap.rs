use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use vaulta_agent::{
    Collaborators, DemoBank, IntentClassifier, OrchestratorSettings, TurnOrchestrator,
};
use vaulta_core::config::{AppConfig, ConfigError, LoadOptions};
use vaulta_core::session::spawn_sweeper;
use vaulta_core::{SessionStore, SweeperHandle};

use crate::classifier::HttpIntentClassifier;

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<TurnOrchestrator>,
    pub sweeper: SweeperHandle,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("intent classifier client could not be built: {0}")]
    Classifier(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let http_classifier =
        HttpIntentClassifier::from_config(&config.classifier).map_err(BootstrapError::Classifier)?;
    info!(
        event_name = "system.bootstrap.classifier",
        correlation_id = "bootstrap",
        provider = ?config.classifier.provider,
        endpoint = http_classifier.as_ref().map(HttpIntentClassifier::endpoint).unwrap_or("none"),
        "intent classifier configured"
    );
    let classifier = http_classifier
        .map(|classifier| Arc::new(classifier) as Arc<dyn IntentClassifier>);

    let bank = DemoBank::seeded();
    let collaborators = match classifier {
        Some(classifier) => Collaborators::demo(bank, classifier),
        None => Collaborators::demo_without_classifier(bank),
    };

    let store = SessionStore::from_config(&config.session);
    let sweeper = spawn_sweeper(store.clone(), config.session.sweep_interval());
    let orchestrator = TurnOrchestrator::new(
        store,
        collaborators,
        OrchestratorSettings::from_config(&config),
    );

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        max_auth_attempts = config.session.max_auth_attempts,
        idle_timeout_secs = config.session.idle_timeout_secs,
        "session store and orchestrator ready"
    );

    Ok(Application { config, orchestrator: Arc::new(orchestrator), sweeper })
}
