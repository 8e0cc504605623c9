//! Seams to the systems the orchestrator does not own: identity
//! verification, intent classification, account data, and irreversible
//! actions.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vaulta_core::{FlowCategory, PendingAction};

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_identity(&self, identity_id: &str, pin: &str) -> Result<bool>;
}

/// Maps an utterance to one of the known flow labels. Implementations must
/// return `Ok(None)` rather than inventing a label.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify_intent(&self, utterance: &str) -> Result<Option<FlowCategory>>;
}

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Runs a confirmed action and returns the customer-facing confirmation.
    async fn execute_action(&self, identity_id: &str, action: &PendingAction) -> Result<String>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn account_summary(&self, identity_id: &str) -> Result<AccountSummary>;
    async fn recent_transactions(
        &self,
        identity_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>>;
    async fn list_cards(&self, identity_id: &str) -> Result<Vec<CardSummary>>;
    async fn request_statement(&self, identity_id: &str) -> Result<StatementReceipt>;
    async fn last_declined_reason(&self, identity_id: &str) -> Result<Option<String>>;
    async fn open_atm_dispute(&self, identity_id: &str) -> Result<String>;
}

/// Classifier used when no external provider is configured. Every utterance
/// the keyword table misses stays unclassified.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl IntentClassifier for DisabledClassifier {
    async fn classify_intent(&self, _utterance: &str) -> Result<Option<FlowCategory>> {
        Ok(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub account_type: String,
    pub account_last_four: String,
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    Debit,
    Credit,
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debit => f.write_str("Debit"),
            Self::Credit => f.write_str("Credit"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Blocked,
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Blocked => f.write_str("blocked"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card_id: String,
    pub kind: CardKind,
    pub last_four: String,
    pub status: CardStatus,
}

impl CardSummary {
    pub fn is_active(&self) -> bool {
        self.status == CardStatus::Active
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementReceipt {
    pub reference: String,
    pub email: String,
}
