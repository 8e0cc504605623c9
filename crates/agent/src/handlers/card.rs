use anyhow::Result;
use async_trait::async_trait;
use vaulta_core::{FlowCategory, PendingAction};

use super::{HandlerContext, HandlerReply, TopicHandler};
use crate::collaborators::{CardKind, CardSummary};
use crate::router::mentions_any;

const LOST_KEYWORDS: &[&str] = &["lost", "stolen", "missing", "block"];
const DECLINED_KEYWORDS: &[&str] = &["declined", "rejected", "not working"];
const ATM_KEYWORDS: &[&str] = &["atm", "cash", "dispense"];

const ISSUE_MENU: &str = "I can help you with your Vaulta cards. Are you calling about a lost or \
stolen card, a declined payment, or an issue with an ATM?";
const ISSUE_MENU_RETRY: &str = "I didn't catch that. Are you calling about: 1) A lost or stolen card \
you need to block, 2) A declined payment, or 3) An ATM issue?";
const WHICH_CARD_RETRY: &str = "Which card - Debit or Credit?";
const WHICH_CARD_REPEATED: &str = "I understand you need to block a card. To help you quickly, \
which card do you want to block - Debit or Credit?";
const NO_ACTIVE_CARDS: &str = "I can't find an active card on your profile, so there's nothing to \
block right now. Is there anything else I can help with?";

/// Lost or stolen cards, declined payments and ATM cash disputes.
#[derive(Clone, Copy, Debug, Default)]
pub struct CardIssuesHandler;

#[async_trait]
impl TopicHandler for CardIssuesHandler {
    fn flow(&self) -> FlowCategory {
        FlowCategory::CardIssues
    }

    async fn handle(&self, context: HandlerContext<'_>) -> Result<HandlerReply> {
        let identity_id = context.require_identity()?;
        let utterance = context.utterance;
        let last_reply = context.last_assistant_message.unwrap_or_default().to_lowercase();

        if last_reply.contains("card ending in") && last_reply.contains("which card") {
            let cards = active_cards(&context, identity_id).await?;
            if let Some(card) = select_card(&cards, utterance) {
                return Ok(stage_block(card));
            }
            if mentions_any(utterance, LOST_KEYWORDS) {
                return Ok(HandlerReply::say(WHICH_CARD_REPEATED));
            }
            return Ok(HandlerReply::say(WHICH_CARD_RETRY));
        }

        if mentions_any(utterance, LOST_KEYWORDS) {
            return lost_card(&context, identity_id).await;
        }
        if mentions_any(utterance, DECLINED_KEYWORDS) {
            return declined_payment(&context, identity_id).await;
        }
        if mentions_any(utterance, ATM_KEYWORDS) {
            let reference = context.directory.open_atm_dispute(identity_id).await?;
            return Ok(HandlerReply::say(atm_dispute_reply(&reference)));
        }

        if last_reply.contains("lost or stolen card") {
            return Ok(HandlerReply::say(ISSUE_MENU_RETRY));
        }
        Ok(HandlerReply::say(ISSUE_MENU))
    }
}

async fn active_cards(context: &HandlerContext<'_>, identity_id: &str) -> Result<Vec<CardSummary>> {
    let cards = context.directory.list_cards(identity_id).await?;
    Ok(cards.into_iter().filter(CardSummary::is_active).collect())
}

async fn lost_card(context: &HandlerContext<'_>, identity_id: &str) -> Result<HandlerReply> {
    let cards = active_cards(context, identity_id).await?;
    if let Some(card) = select_card(&cards, context.utterance) {
        return Ok(stage_block(card));
    }

    match cards.as_slice() {
        [] => Ok(HandlerReply::say(NO_ACTIVE_CARDS)),
        [only] => Ok(stage_block(only)),
        several => {
            let options = several
                .iter()
                .map(|card| format!("your {} card ending in {}", card.kind, card.last_four))
                .collect::<Vec<_>>()
                .join(", or ");
            Ok(HandlerReply::say(format!(
                "I'm sorry to hear that. I can help you block your card immediately. \
                 Which card is it? {}?",
                capitalize(&options)
            )))
        }
    }
}

async fn declined_payment(context: &HandlerContext<'_>, identity_id: &str) -> Result<HandlerReply> {
    let text = match context.directory.last_declined_reason(identity_id).await? {
        Some(reason) => format!(
            "I've checked your recent transactions. It looks like your last payment was declined \
             due to {reason}. Would you like more details on how to resolve this?"
        ),
        None => "I've checked your recent transactions and I don't see any declined payments. \
                 Is there a specific payment you're concerned about?"
            .to_string(),
    };
    Ok(HandlerReply::say(text))
}

/// Picks the card the customer named, by last four digits or by kind.
fn select_card<'c>(cards: &'c [CardSummary], utterance: &str) -> Option<&'c CardSummary> {
    if let Some(card) = cards.iter().find(|card| utterance.contains(card.last_four.as_str())) {
        return Some(card);
    }
    for (word, kind) in [("debit", CardKind::Debit), ("credit", CardKind::Credit)] {
        if utterance.contains(word) {
            let mut matching = cards.iter().filter(|card| card.kind == kind);
            if let (Some(card), None) = (matching.next(), matching.next()) {
                return Some(card);
            }
        }
    }
    None
}

fn stage_block(card: &CardSummary) -> HandlerReply {
    HandlerReply::confirm(
        PendingAction::block_card(card.card_id.clone(), &card.last_four),
        format!(
            "I've found your {} card ending in {}. For your security, blocking a card is PERMANENT \
             and cannot be undone. Are you sure you want to proceed and BLOCK this card?",
            card.kind, card.last_four
        ),
    )
}

fn atm_dispute_reply(reference: &str) -> String {
    format!(
        "I'm sorry about this ATM issue. I've created a dispute case: {reference}\n\n\
         What happens next:\n\
         1. Our team reviews ATM logs within 24 hours\n\
         2. If confirmed, we credit your account in 3-5 business days\n\
         3. You'll receive email updates throughout\n\n\
         Is there anything else I can help with?"
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use vaulta_core::ActionKind;

    use super::CardIssuesHandler;
    use crate::collaborators::{
        AccountDirectory, AccountSummary, CardKind, CardStatus, CardSummary, StatementReceipt,
        TransactionRecord,
    };
    use crate::handlers::{HandlerContext, HandlerReply, TopicHandler};

    struct TwoCards {
        credit_blocked: bool,
    }

    #[async_trait]
    impl AccountDirectory for TwoCards {
        async fn account_summary(&self, _identity_id: &str) -> Result<AccountSummary> {
            Err(anyhow!("unused"))
        }

        async fn recent_transactions(
            &self,
            _identity_id: &str,
            _limit: usize,
        ) -> Result<Vec<TransactionRecord>> {
            Ok(Vec::new())
        }

        async fn list_cards(&self, _identity_id: &str) -> Result<Vec<CardSummary>> {
            let credit_status =
                if self.credit_blocked { CardStatus::Blocked } else { CardStatus::Active };
            Ok(vec![
                CardSummary {
                    card_id: "CARD_001".to_string(),
                    kind: CardKind::Debit,
                    last_four: "0001".to_string(),
                    status: CardStatus::Active,
                },
                CardSummary {
                    card_id: "CARD_999".to_string(),
                    kind: CardKind::Credit,
                    last_four: "9999".to_string(),
                    status: credit_status,
                },
            ])
        }

        async fn request_statement(&self, _identity_id: &str) -> Result<StatementReceipt> {
            Err(anyhow!("unused"))
        }

        async fn last_declined_reason(&self, _identity_id: &str) -> Result<Option<String>> {
            Ok(Some("insufficient funds".to_string()))
        }

        async fn open_atm_dispute(&self, _identity_id: &str) -> Result<String> {
            Ok("ATM-123456".to_string())
        }
    }

    async fn handle(directory: &TwoCards, utterance: &str, last: Option<&str>) -> HandlerReply {
        CardIssuesHandler
            .handle(HandlerContext {
                session_id: "s-1",
                identity_id: Some("1111"),
                utterance,
                last_assistant_message: last,
                directory,
            })
            .await
            .expect("handled")
    }

    #[tokio::test]
    async fn lost_card_asks_which_card_when_several_are_active() {
        let reply = handle(&TwoCards { credit_blocked: false }, "i lost my card", None).await;

        assert!(reply.staged_action.is_none());
        assert!(reply.text.contains(
            "Which card is it? Your Debit card ending in 0001, or your Credit card ending in 9999?"
        ));
    }

    #[tokio::test]
    async fn naming_the_card_stages_a_block() {
        let directory = TwoCards { credit_blocked: false };
        let question = handle(&directory, "my card was stolen", None).await;

        let reply = handle(&directory, "the credit one", Some(&question.text)).await;

        let action = reply.staged_action.expect("staged");
        assert_eq!(action.kind, ActionKind::BlockCard);
        assert_eq!(action.target, "CARD_999");
        assert!(reply.text.contains("PERMANENT"));
    }

    #[tokio::test]
    async fn single_active_card_is_staged_directly() {
        let reply = handle(&TwoCards { credit_blocked: true }, "block my card", None).await;

        assert_eq!(reply.staged_action.map(|action| action.target).as_deref(), Some("CARD_001"));
    }

    #[tokio::test]
    async fn declined_and_atm_issues_do_not_stage_actions() {
        let directory = TwoCards { credit_blocked: false };

        let declined = handle(&directory, "my payment was declined", None).await;
        assert!(declined.text.contains("insufficient funds"));
        assert!(declined.staged_action.is_none());

        let atm = handle(&directory, "the atm did not give me cash", None).await;
        assert!(atm.text.contains("ATM-123456"));
    }

    #[tokio::test]
    async fn vague_request_gets_the_issue_menu() {
        let reply = handle(&TwoCards { credit_blocked: false }, "card problem", None).await;
        assert!(reply.text.starts_with("I can help you with your Vaulta cards."));
    }
}
