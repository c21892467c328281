use super::challenge::Challenge;
use super::ids::{ChallengeId, ReferenceId, TransactionId, UserId};
use super::ledger::{AccountRef, LedgerEntry};
use super::transaction::Transaction;
use super::wallet::Wallet;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Produces unique, time-ordered ids.
pub trait IdGenerator: Send + Sync {
    fn next(&self) -> Uuid;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type IdGeneratorRef = Arc<dyn IdGenerator>;
pub type ClockRef = Arc<dyn Clock>;

/// The action an actor attempts on a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeAction {
    Create,
    UpdateContent,
    UpdateAmount,
    ExtendDeadline,
    Accept,
    StreamerReject,
    ViewerReject,
    StreamerComplete,
    ViewerConfirm,
}

impl fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::UpdateContent => "update content",
            Self::UpdateAmount => "update amount",
            Self::ExtendDeadline => "extend deadline",
            Self::Accept => "accept",
            Self::StreamerReject => "streamer reject",
            Self::ViewerReject => "viewer reject",
            Self::StreamerComplete => "complete",
            Self::ViewerConfirm => "confirm",
        };
        f.write_str(name)
    }
}

/// Yes/no authorization decision, consulted before any transition runs.
pub trait AuthorizationGate: Send + Sync {
    fn allowed(&self, subject: UserId, action: ChallengeAction, challenge: &Challenge) -> bool;
}

pub type AuthorizationGateRef = Arc<dyn AuthorizationGate>;

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Reads a wallet. With `exclusive_lock`, the caller intends to mutate it
    /// and the returned copy must not be handed to any other writer until the
    /// enclosing unit of work commits.
    async fn read(&self, owner: UserId, exclusive_lock: bool) -> Result<Option<Wallet>>;
    async fn save(&self, wallet: Wallet) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<Wallet>>;
}

#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn read(&self, id: ChallengeId) -> Result<Option<Challenge>>;
    async fn save(&self, challenge: Challenge) -> Result<()>;
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn save(&self, transaction: Transaction) -> Result<()>;
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;
    async fn by_reference(&self, reference: ReferenceId) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn save(&self, entry: LedgerEntry) -> Result<()>;
    async fn entries_for(&self, account: AccountRef) -> Result<Vec<LedgerEntry>>;
}

/// Everything one command changed, committed as a single unit.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub challenge: Option<Challenge>,
    pub wallets: Vec<Wallet>,
    pub transaction: Option<Transaction>,
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Persists the challenge, the wallets, the transaction and each of its
    /// ledger entries, or none of them.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}

pub type WalletStoreBox = Box<dyn WalletStore>;
pub type ChallengeStoreBox = Box<dyn ChallengeStore>;
pub type TransactionStoreBox = Box<dyn TransactionStore>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type UnitOfWorkBox = Box<dyn UnitOfWork>;
