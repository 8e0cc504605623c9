use serde::{Deserialize, Serialize};

/// Irreversible operations that must be confirmed before they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BlockCard,
    CloseAccount,
}

impl ActionKind {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::BlockCard => "action.block_card",
            Self::CloseAccount => "action.close_account",
        }
    }
}

/// An action staged by a topic handler and awaiting an explicit yes/no.
///
/// `description` is quoted verbatim in confirmation and cancellation prompts,
/// so it should read as an imperative phrase ("block your card ending in 0001").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub target: String,
    pub description: String,
}

impl PendingAction {
    pub fn block_card(card_id: impl Into<String>, last_four: &str) -> Self {
        Self {
            kind: ActionKind::BlockCard,
            target: card_id.into(),
            description: format!("block your card ending in {last_four}"),
        }
    }

    pub fn close_account(account_id: impl Into<String>, last_four: &str) -> Self {
        Self {
            kind: ActionKind::CloseAccount,
            target: account_id.into(),
            description: format!("close your account ending in {last_four}"),
        }
    }
}
