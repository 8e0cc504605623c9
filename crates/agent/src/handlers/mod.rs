//! Topic handlers, one per flow category.
//!
//! Handlers only decide what to say and whether to stage an irreversible
//! action. They never execute actions themselves; that happens in the
//! confirmation protocol once the customer says yes.

pub mod account;
pub mod card;
pub mod stubs;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use vaulta_core::{FlowCategory, PendingAction};

use crate::collaborators::AccountDirectory;
use crate::prompts;

pub use account::AccountServicingHandler;
pub use card::CardIssuesHandler;
pub use stubs::InformationalHandler;

pub struct HandlerContext<'a> {
    pub session_id: &'a str,
    /// Present whenever the flow is gated; handlers of open flows must not
    /// rely on it.
    pub identity_id: Option<&'a str>,
    /// Lowercased intent text for this turn.
    pub utterance: &'a str,
    pub last_assistant_message: Option<&'a str>,
    pub directory: &'a dyn AccountDirectory,
}

impl HandlerContext<'_> {
    pub fn require_identity(&self) -> Result<&str> {
        self.identity_id.ok_or_else(|| anyhow::anyhow!("handler reached without a verified identity"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerReply {
    pub text: String,
    pub staged_action: Option<PendingAction>,
    pub requires_human: bool,
}

impl HandlerReply {
    pub fn say(text: impl Into<String>) -> Self {
        Self { text: text.into(), staged_action: None, requires_human: false }
    }

    pub fn escalate(text: impl Into<String>) -> Self {
        Self { text: text.into(), staged_action: None, requires_human: true }
    }

    /// Stages `action` and asks for confirmation in the same reply.
    pub fn confirm(action: PendingAction, prompt: impl Into<String>) -> Self {
        Self { text: prompt.into(), staged_action: Some(action), requires_human: false }
    }
}

#[async_trait]
pub trait TopicHandler: Send + Sync {
    fn flow(&self) -> FlowCategory;
    async fn handle(&self, context: HandlerContext<'_>) -> Result<HandlerReply>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<FlowCategory, Arc<dyn TopicHandler>>,
}

impl HandlerRegistry {
    /// Registry with the built-in handler for every flow category.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register(CardIssuesHandler);
        registry.register(AccountServicingHandler);
        for flow in [
            FlowCategory::AccountOpening,
            FlowCategory::DigitalSupport,
            FlowCategory::Transfers,
            FlowCategory::AccountClosure,
        ] {
            registry.register(InformationalHandler::new(flow));
        }
        registry
    }

    pub fn register<T>(&mut self, handler: T)
    where
        T: TopicHandler + 'static,
    {
        self.handlers.insert(handler.flow(), Arc::new(handler));
    }

    pub fn get(&self, flow: FlowCategory) -> Option<Arc<dyn TopicHandler>> {
        self.handlers.get(&flow).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Reply for turns with no flow.
pub fn general_help() -> HandlerReply {
    HandlerReply::say(prompts::GENERAL_HELP)
}

/// Renders an amount as `$1,250.50`; negative amounts keep their sign.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.abs().round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{rounded:.2}");
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}${grouped}.{cents}")
}
