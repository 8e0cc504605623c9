use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Topic categories a conversation can be routed to. The set is closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowCategory {
    CardIssues,
    AccountServicing,
    AccountOpening,
    DigitalSupport,
    Transfers,
    AccountClosure,
}

impl FlowCategory {
    /// Classification order used by both keyword routing and label parsing.
    pub const ALL: [FlowCategory; 6] = [
        FlowCategory::CardIssues,
        FlowCategory::AccountServicing,
        FlowCategory::AccountOpening,
        FlowCategory::DigitalSupport,
        FlowCategory::Transfers,
        FlowCategory::AccountClosure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::CardIssues => "card_issues",
            Self::AccountServicing => "account_servicing",
            Self::AccountOpening => "account_opening",
            Self::DigitalSupport => "digital_support",
            Self::Transfers => "transfers",
            Self::AccountClosure => "account_closure",
        }
    }

    /// Only these flows sit behind the authentication gate.
    pub fn requires_verification(self) -> bool {
        matches!(self, Self::CardIssues | Self::AccountServicing)
    }

    /// Picks the first known label mentioned in free-form classifier output.
    pub fn find_in_text(text: &str) -> Option<Self> {
        let lowered = text.to_ascii_lowercase();
        Self::ALL.into_iter().find(|flow| lowered.contains(flow.label()))
    }
}

impl fmt::Display for FlowCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownFlowLabel(pub String);

impl fmt::Display for UnknownFlowLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown flow label `{}`", self.0)
    }
}

impl std::error::Error for UnknownFlowLabel {}

impl FromStr for FlowCategory {
    type Err = UnknownFlowLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|flow| flow.label() == normalized)
            .ok_or_else(|| UnknownFlowLabel(value.to_string()))
    }
}
