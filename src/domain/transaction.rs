use crate::domain::ids::{ReferenceId, TransactionId};
use crate::domain::ledger::{LedgerEntry, Posting};
use crate::domain::money::Token;
use crate::domain::ports::{ClockRef, IdGeneratorRef};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    Transfer,
    EscrowLock,
    EscrowRelease,
}

/// Free-form annotations, e.g. the reason for a release.
pub type Metadata = BTreeMap<String, String>;

pub fn reason(text: &str) -> Metadata {
    Metadata::from([("reason".to_string(), text.to_string())])
}

/// An atomic, balanced money movement. Immutable once created.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    id: TransactionId,
    r#type: TransactionType,
    amount: Token,
    reference_id: ReferenceId,
    entries: Vec<LedgerEntry>,
    metadata: Metadata,
    created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn r#type(&self) -> TransactionType {
        self.r#type
    }

    pub fn amount(&self) -> Token {
        self.amount
    }

    pub fn reference_id(&self) -> ReferenceId {
        self.reference_id
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn total_debits(&self) -> Token {
        self.entries.iter().map(LedgerEntry::debit).sum()
    }

    pub fn total_credits(&self) -> Token {
        self.entries.iter().map(LedgerEntry::credit).sum()
    }
}

/// The single balance-integrity checkpoint: every transaction in the system
/// is built here.
#[derive(Clone)]
pub struct TransactionFactory {
    ids: IdGeneratorRef,
    clock: ClockRef,
}

impl TransactionFactory {
    pub fn new(ids: IdGeneratorRef, clock: ClockRef) -> Self {
        Self { ids, clock }
    }

    pub fn create_transaction(
        &self,
        r#type: TransactionType,
        amount: Token,
        reference_id: ReferenceId,
        postings: Vec<Posting>,
        metadata: Metadata,
    ) -> Result<Transaction> {
        if !amount.is_positive() {
            return Err(EscrowError::DomainRule(format!(
                "Transaction amount must be greater than 0, but got {amount}"
            )));
        }
        if postings.len() < 2 {
            return Err(EscrowError::DomainRule(format!(
                "Transaction requires at least two ledger entries, but got {}",
                postings.len()
            )));
        }
        let debits: Token = postings.iter().map(Posting::debit).sum();
        let credits: Token = postings.iter().map(Posting::credit).sum();
        if debits != credits {
            return Err(EscrowError::Unbalanced {
                debits: debits.value(),
                credits: credits.value(),
            });
        }

        let id = TransactionId::new(self.ids.next());
        Ok(Transaction {
            id,
            r#type,
            amount,
            reference_id,
            entries: postings.into_iter().map(|p| p.into_entry(id)).collect(),
            metadata,
            created_at: self.clock.now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::UserId;
    use crate::domain::ledger::LedgerEntryFactory;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::ids::SequentialIdGenerator;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use uuid::Uuid;

    fn factories() -> (LedgerEntryFactory, TransactionFactory) {
        let ids = Arc::new(SequentialIdGenerator::new());
        let clock = Arc::new(ManualClock::default());
        (
            LedgerEntryFactory::new(ids.clone(), clock.clone()),
            TransactionFactory::new(ids, clock),
        )
    }

    fn token(value: Decimal) -> Token {
        Token::new(value).unwrap()
    }

    fn reference() -> ReferenceId {
        ReferenceId::new(Uuid::from_u128(500))
    }

    #[test]
    fn test_create_balanced_transaction() {
        let (ledger, transactions) = factories();
        let viewer = UserId::new(Uuid::from_u128(1));
        let amount = token(dec!(100.00));
        let tx = transactions
            .create_transaction(
                TransactionType::EscrowLock,
                amount,
                reference(),
                vec![
                    ledger.user_wallet_debit(viewer, amount).unwrap(),
                    ledger.escrow_credit(amount).unwrap(),
                ],
                reason("Challenge Created"),
            )
            .unwrap();

        assert_eq!(tx.entries().len(), 2);
        assert!(tx.entries().iter().all(|e| e.transaction_id() == tx.id()));
        assert_eq!(tx.total_debits(), tx.total_credits());
        assert_eq!(tx.metadata()["reason"], "Challenge Created");
    }

    #[test]
    fn test_rejects_zero_amount() {
        let (ledger, transactions) = factories();
        let result = transactions.create_transaction(
            TransactionType::Transfer,
            Token::ZERO,
            reference(),
            vec![
                ledger.escrow_debit(token(dec!(1))).unwrap(),
                ledger.commission_credit(token(dec!(1))).unwrap(),
            ],
            Metadata::new(),
        );
        assert!(matches!(result, Err(EscrowError::DomainRule(_))));
    }

    #[test]
    fn test_rejects_single_leg() {
        let (ledger, transactions) = factories();
        let result = transactions.create_transaction(
            TransactionType::Deposit,
            token(dec!(1)),
            reference(),
            vec![ledger.bank_debit(token(dec!(1))).unwrap()],
            Metadata::new(),
        );
        assert!(matches!(result, Err(EscrowError::DomainRule(_))));
    }

    #[test]
    fn test_rejects_unbalanced_legs() {
        let (ledger, transactions) = factories();
        let viewer = UserId::new(Uuid::from_u128(1));
        let result = transactions.create_transaction(
            TransactionType::EscrowRelease,
            token(dec!(100)),
            reference(),
            vec![
                ledger.escrow_debit(token(dec!(100))).unwrap(),
                ledger.commission_credit(token(dec!(10))).unwrap(),
                ledger.user_wallet_credit(viewer, token(dec!(89.99))).unwrap(),
            ],
            Metadata::new(),
        );
        assert!(matches!(
            result,
            Err(EscrowError::Unbalanced { debits, credits })
                if debits == dec!(100) && credits == dec!(99.99)
        ));
    }

    #[test]
    fn test_transaction_serde_shape() {
        let (ledger, transactions) = factories();
        let amount = token(dec!(5));
        let tx = transactions
            .create_transaction(
                TransactionType::Deposit,
                amount,
                reference(),
                vec![
                    ledger.bank_debit(amount).unwrap(),
                    ledger
                        .user_wallet_credit(UserId::new(Uuid::from_u128(3)), amount)
                        .unwrap(),
                ],
                Metadata::new(),
            )
            .unwrap();

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "deposit");
        assert_eq!(json["entries"][0]["account"]["account_type"], "bank");
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }
}
