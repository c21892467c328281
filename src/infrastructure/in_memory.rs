use crate::domain::challenge::Challenge;
use crate::domain::ids::{ChallengeId, EntryId, ReferenceId, TransactionId, UserId};
use crate::domain::ledger::{AccountRef, LedgerEntry};
use crate::domain::ports::{
    ChallengeStore, ChangeSet, LedgerStore, TransactionStore, UnitOfWork, WalletStore,
};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    wallets: BTreeMap<UserId, Wallet>,
    challenges: HashMap<ChallengeId, Challenge>,
    // Keyed by time-ordered id, so iteration follows creation order.
    transactions: BTreeMap<TransactionId, Transaction>,
    entries: Vec<LedgerEntry>,
    entry_ids: HashSet<EntryId>,
}

impl State {
    fn check(&self, changes: &ChangeSet) -> Result<()> {
        let Some(tx) = &changes.transaction else {
            return Ok(());
        };
        if self.transactions.contains_key(&tx.id()) {
            return Err(conflict(format!("transaction {} already recorded", tx.id())));
        }
        if let Some(entry) = tx.entries().iter().find(|e| self.entry_ids.contains(&e.id())) {
            return Err(conflict(format!("ledger entry {} already recorded", entry.id())));
        }
        Ok(())
    }

    fn push_entry(&mut self, entry: LedgerEntry) {
        if self.entry_ids.insert(entry.id()) {
            self.entries.push(entry);
        }
    }
}

fn conflict(message: String) -> EscrowError {
    EscrowError::InternalError(Box::new(std::io::Error::other(message)))
}

/// A thread-safe in-memory store backing every persistence port.
///
/// All entities live behind one `Arc<RwLock<..>>`, so a [`ChangeSet`] is
/// applied under a single write lock and readers never observe half of it.
/// Cloning shares the underlying state.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryStore {
    async fn read(&self, owner: UserId, _exclusive_lock: bool) -> Result<Option<Wallet>> {
        let state = self.state.read().await;
        Ok(state.wallets.get(&owner).cloned())
    }

    async fn save(&self, wallet: Wallet) -> Result<()> {
        let mut state = self.state.write().await;
        state.wallets.insert(wallet.owner(), wallet);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Wallet>> {
        let state = self.state.read().await;
        Ok(state.wallets.values().cloned().collect())
    }
}

#[async_trait]
impl ChallengeStore for InMemoryStore {
    async fn read(&self, id: ChallengeId) -> Result<Option<Challenge>> {
        let state = self.state.read().await;
        Ok(state.challenges.get(&id).cloned())
    }

    async fn save(&self, challenge: Challenge) -> Result<()> {
        let mut state = self.state.write().await;
        state.challenges.insert(challenge.id(), challenge);
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn save(&self, transaction: Transaction) -> Result<()> {
        let mut state = self.state.write().await;
        state.transactions.insert(transaction.id(), transaction);
        Ok(())
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(&id).cloned())
    }

    async fn by_reference(&self, reference: ReferenceId) -> Result<Vec<Transaction>> {
        let state = self.state.read().await;
        Ok(state
            .transactions
            .values()
            .filter(|tx| tx.reference_id() == reference)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn save(&self, entry: LedgerEntry) -> Result<()> {
        let mut state = self.state.write().await;
        state.push_entry(entry);
        Ok(())
    }

    async fn entries_for(&self, account: AccountRef) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|entry| entry.account() == account)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut state = self.state.write().await;
        state.check(&changes)?;

        if let Some(challenge) = changes.challenge {
            state.challenges.insert(challenge.id(), challenge);
        }
        for wallet in changes.wallets {
            state.wallets.insert(wallet.owner(), wallet);
        }
        if let Some(tx) = changes.transaction {
            for entry in tx.entries() {
                state.push_entry(entry.clone());
            }
            state.transactions.insert(tx.id(), tx);
        }
        Ok(())
    }
}
