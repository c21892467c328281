use crate::domain::ids::{EntryId, TransactionId, UserId};
use crate::domain::money::Token;
use crate::domain::ports::{ClockRef, IdGeneratorRef};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Bank,
    UserWallet,
    Escrow,
    Commission,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bank => "bank",
            Self::UserWallet => "user_wallet",
            Self::Escrow => "escrow",
            Self::Commission => "commission",
        };
        f.write_str(name)
    }
}

/// A concrete ledger account: a user's wallet or one of the virtual system
/// accounts.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(tag = "account_type", content = "account_id", rename_all = "snake_case")]
pub enum AccountRef {
    Bank,
    UserWallet(UserId),
    Escrow,
    Commission,
}

impl AccountRef {
    pub fn account_type(&self) -> AccountType {
        match self {
            Self::Bank => AccountType::Bank,
            Self::UserWallet(_) => AccountType::UserWallet,
            Self::Escrow => AccountType::Escrow,
            Self::Commission => AccountType::Commission,
        }
    }

    pub fn account_id(&self) -> Option<UserId> {
        match self {
            Self::UserWallet(owner) => Some(*owner),
            _ => None,
        }
    }

    fn from_parts(account_type: AccountType, account_id: Option<UserId>) -> Result<Self> {
        match (account_type, account_id) {
            (AccountType::UserWallet, Some(owner)) => Ok(Self::UserWallet(owner)),
            (AccountType::UserWallet, None) => Err(EscrowError::InvalidLedgerEntry(
                "user wallet entries require an account id".to_string(),
            )),
            (AccountType::Bank, None) => Ok(Self::Bank),
            (AccountType::Escrow, None) => Ok(Self::Escrow),
            (AccountType::Commission, None) => Ok(Self::Commission),
            (system, Some(_)) => Err(EscrowError::InvalidLedgerEntry(format!(
                "{system} entries cannot carry an account id"
            ))),
        }
    }
}

/// A validated ledger leg not yet attached to a transaction.
#[derive(Debug, PartialEq, Clone)]
pub struct Posting {
    id: EntryId,
    account: AccountRef,
    debit: Token,
    credit: Token,
    created_at: DateTime<Utc>,
}

impl Posting {
    fn new(
        id: EntryId,
        account: AccountRef,
        debit: Token,
        credit: Token,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if debit.is_positive() && credit.is_positive() {
            return Err(EscrowError::InvalidLedgerEntry(
                "entry cannot have both debit and credit > 0".to_string(),
            ));
        }
        if debit.is_zero() && credit.is_zero() {
            return Err(EscrowError::InvalidLedgerEntry(
                "entry must have debit or credit > 0".to_string(),
            ));
        }
        Ok(Self {
            id,
            account,
            debit,
            credit,
            created_at,
        })
    }

    pub fn account(&self) -> AccountRef {
        self.account
    }

    pub fn debit(&self) -> Token {
        self.debit
    }

    pub fn credit(&self) -> Token {
        self.credit
    }

    pub(crate) fn into_entry(self, transaction_id: TransactionId) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            transaction_id,
            account: self.account,
            debit: self.debit,
            credit: self.credit,
            created_at: self.created_at,
        }
    }
}

/// One immutable side of a balanced money movement, owned by a transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    id: EntryId,
    transaction_id: TransactionId,
    account: AccountRef,
    debit: Token,
    credit: Token,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    pub fn account_type(&self) -> AccountType {
        self.account.account_type()
    }

    /// Present for user wallets, absent for system accounts.
    pub fn account_id(&self) -> Option<UserId> {
        self.account.account_id()
    }

    pub fn account(&self) -> AccountRef {
        self.account
    }

    pub fn debit(&self) -> Token {
        self.debit
    }

    pub fn credit(&self) -> Token {
        self.credit
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Net position of `account` across `entries`: credits minus debits.
///
/// For a user wallet this equals the wallet balance; for escrow it is the
/// amount currently locked; for commission, the fees retained. The bank
/// account goes negative as money enters the platform.
pub fn account_balance<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
    account: AccountRef,
) -> Decimal {
    entries
        .into_iter()
        .filter(|entry| entry.account() == account)
        .map(|entry| entry.credit.value() - entry.debit.value())
        .sum()
}

/// Builds postings with fresh ids and the current time, stamping the account
/// type and zeroing the unused side.
#[derive(Clone)]
pub struct LedgerEntryFactory {
    ids: IdGeneratorRef,
    clock: ClockRef,
}

impl LedgerEntryFactory {
    pub fn new(ids: IdGeneratorRef, clock: ClockRef) -> Self {
        Self { ids, clock }
    }

    /// General constructor; the per-account helpers below delegate here.
    pub fn create(
        &self,
        account_type: AccountType,
        account_id: Option<UserId>,
        debit: Token,
        credit: Token,
    ) -> Result<Posting> {
        let account = AccountRef::from_parts(account_type, account_id)?;
        Posting::new(
            EntryId::new(self.ids.next()),
            account,
            debit,
            credit,
            self.clock.now(),
        )
    }

    pub fn debit(&self, account: AccountRef, amount: Token) -> Result<Posting> {
        self.create(account.account_type(), account.account_id(), amount, Token::ZERO)
    }

    pub fn credit(&self, account: AccountRef, amount: Token) -> Result<Posting> {
        self.create(account.account_type(), account.account_id(), Token::ZERO, amount)
    }

    pub fn user_wallet_debit(&self, owner: UserId, amount: Token) -> Result<Posting> {
        self.debit(AccountRef::UserWallet(owner), amount)
    }

    pub fn user_wallet_credit(&self, owner: UserId, amount: Token) -> Result<Posting> {
        self.credit(AccountRef::UserWallet(owner), amount)
    }

    pub fn escrow_debit(&self, amount: Token) -> Result<Posting> {
        self.debit(AccountRef::Escrow, amount)
    }

    pub fn escrow_credit(&self, amount: Token) -> Result<Posting> {
        self.credit(AccountRef::Escrow, amount)
    }

    pub fn commission_credit(&self, amount: Token) -> Result<Posting> {
        self.credit(AccountRef::Commission, amount)
    }

    pub fn bank_debit(&self, amount: Token) -> Result<Posting> {
        self.debit(AccountRef::Bank, amount)
    }

    pub fn bank_credit(&self, amount: Token) -> Result<Posting> {
        self.credit(AccountRef::Bank, amount)
    }
}
