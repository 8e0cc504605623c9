//! In-memory bank used by the server and CLI when no real core-banking
//! integration is wired in. Seeded with two customers; card blocks and
//! account closures mutate the in-memory state so a session sees its own
//! changes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::info;
use vaulta_core::{hash_identity_id, ActionKind, PendingAction};

use crate::collaborators::{
    AccountDirectory, AccountSummary, ActionExecutor, CardKind, CardStatus, CardSummary,
    IdentityVerifier, StatementReceipt, TransactionRecord,
};

#[derive(Clone, Debug)]
struct DemoCustomer {
    pin: String,
    email: String,
    account: AccountSummary,
    closed: bool,
    cards: Vec<CardSummary>,
    transactions: Vec<TransactionRecord>,
    declined_reason: Option<String>,
}

#[derive(Clone, Default)]
pub struct DemoBank {
    customers: Arc<Mutex<HashMap<String, DemoCustomer>>>,
}

impl DemoBank {
    /// Bank seeded with customer `1111` (PIN `2222`, debit and credit cards)
    /// and customer `1234` (PIN `5678`, one debit card).
    pub fn seeded() -> Self {
        let mut customers = HashMap::new();
        customers.insert(
            "1111".to_string(),
            DemoCustomer {
                pin: "2222".to_string(),
                email: "jordan.lee@example.com".to_string(),
                account: AccountSummary {
                    account_id: "4321567890".to_string(),
                    account_type: "Checking".to_string(),
                    account_last_four: "7890".to_string(),
                    balance: Decimal::new(125_050, 2),
                    currency: "USD".to_string(),
                },
                closed: false,
                cards: vec![
                    card("CARD_001", CardKind::Debit, "0001"),
                    card("CARD_999", CardKind::Credit, "9999"),
                ],
                transactions: vec![
                    transaction(date(2026, 2, 5), Decimal::new(-4_500, 2), "Grocery Store"),
                    transaction(date(2026, 2, 4), Decimal::new(-12_000, 2), "Gas Station"),
                    transaction(date(2026, 2, 1), Decimal::new(120_000, 2), "Salary Deposit - Vaulta Corp"),
                    transaction(date(2026, 1, 30), Decimal::new(-8_999, 2), "Amazon Purchase"),
                    transaction(date(2026, 1, 28), Decimal::new(-2_550, 2), "Coffee Shop"),
                ],
                declined_reason: Some("insufficient funds".to_string()),
            },
        );
        customers.insert(
            "1234".to_string(),
            DemoCustomer {
                pin: "5678".to_string(),
                email: "sam.rivera@example.com".to_string(),
                account: AccountSummary {
                    account_id: "9876012345".to_string(),
                    account_type: "Savings".to_string(),
                    account_last_four: "2345".to_string(),
                    balance: Decimal::new(1_842_075, 2),
                    currency: "USD".to_string(),
                },
                closed: false,
                cards: vec![card("CARD_204", CardKind::Debit, "4417")],
                transactions: vec![
                    transaction(date(2026, 2, 3), Decimal::new(25_000, 2), "Transfer from Checking"),
                    transaction(date(2026, 1, 31), Decimal::new(1_275, 2), "Interest Payment"),
                ],
                declined_reason: None,
            },
        );
        Self { customers: Arc::new(Mutex::new(customers)) }
    }

    fn customers(&self) -> MutexGuard<'_, HashMap<String, DemoCustomer>> {
        match self.customers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn with_customer<T>(
        &self,
        identity_id: &str,
        read: impl FnOnce(&mut DemoCustomer) -> Result<T>,
    ) -> Result<T> {
        let mut customers = self.customers();
        let customer = customers
            .get_mut(identity_id)
            .ok_or_else(|| anyhow!("unknown customer {}", hash_identity_id(identity_id)))?;
        if customer.closed {
            bail!("account for customer {} is closed", hash_identity_id(identity_id));
        }
        read(customer)
    }
}

#[async_trait]
impl IdentityVerifier for DemoBank {
    async fn verify_identity(&self, identity_id: &str, pin: &str) -> Result<bool> {
        let customers = self.customers();
        Ok(customers.get(identity_id).is_some_and(|customer| customer.pin == pin))
    }
}

#[async_trait]
impl AccountDirectory for DemoBank {
    async fn account_summary(&self, identity_id: &str) -> Result<AccountSummary> {
        self.with_customer(identity_id, |customer| Ok(customer.account.clone()))
    }

    async fn recent_transactions(
        &self,
        identity_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        self.with_customer(identity_id, |customer| {
            Ok(customer.transactions.iter().take(limit).cloned().collect())
        })
    }

    async fn list_cards(&self, identity_id: &str) -> Result<Vec<CardSummary>> {
        self.with_customer(identity_id, |customer| Ok(customer.cards.clone()))
    }

    async fn request_statement(&self, identity_id: &str) -> Result<StatementReceipt> {
        self.with_customer(identity_id, |customer| {
            Ok(StatementReceipt { reference: dated_reference("STMT"), email: customer.email.clone() })
        })
    }

    async fn last_declined_reason(&self, identity_id: &str) -> Result<Option<String>> {
        self.with_customer(identity_id, |customer| Ok(customer.declined_reason.clone()))
    }

    async fn open_atm_dispute(&self, identity_id: &str) -> Result<String> {
        self.with_customer(identity_id, |_| {
            Ok(format!("ATM-{}", rand::thread_rng().gen_range(100_000..=999_999)))
        })
    }
}

#[async_trait]
impl ActionExecutor for DemoBank {
    async fn execute_action(&self, identity_id: &str, action: &PendingAction) -> Result<String> {
        let message = self.with_customer(identity_id, |customer| match action.kind {
            ActionKind::BlockCard => {
                let card = customer
                    .cards
                    .iter_mut()
                    .find(|card| card.card_id == action.target)
                    .ok_or_else(|| anyhow!("card {} not found", action.target))?;
                if card.status == CardStatus::Blocked {
                    bail!("card {} is already blocked", action.target);
                }
                card.status = CardStatus::Blocked;
                Ok(format!(
                    "Done. Your {} card ending in {} has been permanently blocked. Reference number: \
                     {}. A replacement card has been ordered and will arrive at your registered \
                     address within 5-7 business days.",
                    card.kind,
                    card.last_four,
                    dated_reference("BLK")
                ))
            }
            ActionKind::CloseAccount => {
                if customer.account.account_id != action.target {
                    bail!("account does not belong to this customer");
                }
                customer.closed = true;
                Ok(format!(
                    "Your account ending in {} has been closed. Reference number: {}. Any \
                     remaining balance will be sent to you by cheque within 10 business days.",
                    customer.account.account_last_four,
                    dated_reference("CLS")
                ))
            }
        })?;

        info!(
            event_name = "demo_bank.action.executed",
            action = action.kind.action_key(),
            identity = %hash_identity_id(identity_id),
            "demo bank executed action"
        );
        Ok(message)
    }
}

fn card(card_id: &str, kind: CardKind, last_four: &str) -> CardSummary {
    CardSummary {
        card_id: card_id.to_string(),
        kind,
        last_four: last_four.to_string(),
        status: CardStatus::Active,
    }
}

fn transaction(date: NaiveDate, amount: Decimal, description: &str) -> TransactionRecord {
    TransactionRecord { date, amount, description: description.to_string() }
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(NaiveDate::MIN)
}

fn dated_reference(prefix: &str) -> String {
    format!(
        "{prefix}-{}-{}",
        Utc::now().format("%Y%m%d"),
        rand::thread_rng().gen_range(1_000..=9_999)
    )
}

#[cfg(test)]
mod tests {
    use vaulta_core::PendingAction;

    use super::DemoBank;
    use crate::collaborators::{AccountDirectory, ActionExecutor, CardStatus, IdentityVerifier};

    #[tokio::test]
    async fn seeded_customers_verify_with_their_pin_only() {
        let bank = DemoBank::seeded();
        assert!(bank.verify_identity("1111", "2222").await.expect("verify"));
        assert!(bank.verify_identity("1234", "5678").await.expect("verify"));
        assert!(!bank.verify_identity("1111", "5678").await.expect("verify"));
        assert!(!bank.verify_identity("0000", "2222").await.expect("verify"));
    }

    #[tokio::test]
    async fn blocking_a_card_is_visible_and_not_repeatable() {
        let bank = DemoBank::seeded();
        let action = PendingAction::block_card("CARD_001", "0001");

        let message = bank.execute_action("1111", &action).await.expect("blocked");
        assert!(message.contains("ending in 0001"));
        assert!(message.contains("BLK-"));

        let cards = bank.list_cards("1111").await.expect("cards");
        assert_eq!(cards[0].status, CardStatus::Blocked);
        assert!(bank.execute_action("1111", &action).await.is_err());
    }

    #[tokio::test]
    async fn closed_account_rejects_further_lookups() {
        let bank = DemoBank::seeded();
        let action = PendingAction::close_account("9876012345", "2345");

        bank.execute_action("1234", &action).await.expect("closed");

        assert!(bank.account_summary("1234").await.is_err());
    }

    #[tokio::test]
    async fn atm_dispute_reference_has_six_digits() {
        let reference = DemoBank::seeded().open_atm_dispute("1111").await.expect("dispute");
        assert_eq!(reference.len(), "ATM-".len() + 6);
        assert!(reference.starts_with("ATM-"));
    }
}
