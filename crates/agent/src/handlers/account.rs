use anyhow::Result;
use async_trait::async_trait;
use vaulta_core::{FlowCategory, PendingAction};

use super::{format_amount, HandlerContext, HandlerReply, TopicHandler};
use crate::router::{mentions, mentions_any};

const RECENT_TRANSACTION_COUNT: usize = 3;

const CLOSE_KEYWORDS: &[&str] = &["close my account", "close account", "close the account"];
const BALANCE_KEYWORDS: &[&str] = &["balance", "how much", "money"];
const TRANSACTION_KEYWORDS: &[&str] = &["transaction", "history", "recent"];
const CARD_LIST_KEYWORDS: &[&str] = &["card", "cards"];
const PROFILE_KEYWORDS: &[&str] = &["profile", "update", "change", "address"];

const MENU: &str = "I can help you with:\n\
• Check account balance\n\
• View recent transactions\n\
• Request statements\n\
• View your cards\n\
• Update profile information\n\n\
What would you like to do?";
const PROFILE_UPDATE: &str = "For security, profile updates require verification by a \
representative. I'll transfer you now. They can update your information safely.";
const NO_TRANSACTIONS: &str = "You don't have any recent transactions.";
const NO_CARDS: &str = "You don't have any cards on file.";

/// Balance, transactions, statements, card listing, profile updates and
/// explicit account closure requests.
#[derive(Clone, Copy, Debug, Default)]
pub struct AccountServicingHandler;

#[async_trait]
impl TopicHandler for AccountServicingHandler {
    fn flow(&self) -> FlowCategory {
        FlowCategory::AccountServicing
    }

    async fn handle(&self, context: HandlerContext<'_>) -> Result<HandlerReply> {
        let identity_id = context.require_identity()?;
        let utterance = context.utterance;

        if mentions_any(utterance, CLOSE_KEYWORDS) {
            let account = context.directory.account_summary(identity_id).await?;
            let action =
                PendingAction::close_account(account.account_id, &account.account_last_four);
            let prompt = format!(
                "Closing your {} account ending in {} is PERMANENT and cannot be undone. \
                 Are you sure you want to proceed and CLOSE this account?",
                account.account_type.to_lowercase(),
                account.account_last_four
            );
            return Ok(HandlerReply::confirm(action, prompt));
        }

        if mentions_any(utterance, BALANCE_KEYWORDS) {
            let account = context.directory.account_summary(identity_id).await?;
            return Ok(HandlerReply::say(format!(
                "Your {} balance is {}. Would you like to see recent transactions as well?",
                account.account_type.to_lowercase(),
                format_amount(account.balance)
            )));
        }

        if mentions_any(utterance, TRANSACTION_KEYWORDS) {
            let transactions = context
                .directory
                .recent_transactions(identity_id, RECENT_TRANSACTION_COUNT)
                .await?;
            if transactions.is_empty() {
                return Ok(HandlerReply::say(NO_TRANSACTIONS));
            }
            let lines = transactions
                .iter()
                .map(|record| {
                    let amount = format_amount(record.amount.abs());
                    if record.amount.is_sign_negative() {
                        format!("• {}: Spent {amount} at {}", record.date, record.description)
                    } else {
                        format!("• {}: Received {amount} from {}", record.date, record.description)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(HandlerReply::say(format!(
                "Here are your last {} transactions:\n\n{lines}\n\nWould you like to see more?",
                transactions.len()
            )));
        }

        if mentions(utterance, "statement") {
            let receipt = context.directory.request_statement(identity_id).await?;
            return Ok(HandlerReply::say(format!(
                "Perfect! Your monthly statement will be emailed to {} within 24 hours. \
                 Reference: {}",
                receipt.email, receipt.reference
            )));
        }

        if mentions_any(utterance, CARD_LIST_KEYWORDS) && !mentions(utterance, "block") {
            let cards = context.directory.list_cards(identity_id).await?;
            if cards.is_empty() {
                return Ok(HandlerReply::say(NO_CARDS));
            }
            let lines = cards
                .iter()
                .map(|card| format!("• {} card ending in {} ({})", card.kind, card.last_four, card.status))
                .collect::<Vec<_>>()
                .join("\n");
            return Ok(HandlerReply::say(format!(
                "You have {} card(s) on file:\n\n{lines}\n\nWould you like details about any specific card?",
                cards.len()
            )));
        }

        if mentions_any(utterance, PROFILE_KEYWORDS) {
            return Ok(HandlerReply::escalate(PROFILE_UPDATE));
        }

        Ok(HandlerReply::say(MENU))
    }
}
