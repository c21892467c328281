use crate::domain::challenge::Challenge;
use crate::domain::ids::{ChallengeId, ReferenceId, TransactionId, UserId};
use crate::domain::ledger::{AccountRef, LedgerEntry};
use crate::domain::ports::{
    ChallengeStore, ChangeSet, LedgerStore, TransactionStore, UnitOfWork, WalletStore,
};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// Column Family for wallet balances.
pub const CF_WALLETS: &str = "wallets";
/// Column Family for challenges.
pub const CF_CHALLENGES: &str = "challenges";
/// Column Family for transactions, entries included.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for individual ledger entries.
pub const CF_LEDGER_ENTRIES: &str = "ledger_entries";

/// A persistent store implementation using RocksDB.
///
/// Each entity kind lives in its own Column Family, keyed by the 16 bytes of
/// its id and encoded as JSON. A [`ChangeSet`] is written as one `WriteBatch`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [CF_WALLETS, CF_CHALLENGES, CF_TRANSACTIONS, CF_LEDGER_ENTRIES]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, families)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EscrowError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn fetch<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_value<T: Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(name)?;
        self.db.put_cf(cf, key, encode(value)?)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }

    fn contains(&self, name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(name)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }
}

fn conflict(message: String) -> EscrowError {
    EscrowError::InternalError(Box::new(std::io::Error::other(message)))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl WalletStore for RocksDBStore {
    // Exclusivity is provided by the engine's writer lock; RocksDB itself has
    // no row locks outside transactions.
    async fn read(&self, owner: UserId, _exclusive_lock: bool) -> Result<Option<Wallet>> {
        self.fetch(CF_WALLETS, owner.value().as_bytes())
    }

    async fn save(&self, wallet: Wallet) -> Result<()> {
        self.put_value(CF_WALLETS, wallet.owner().value().as_bytes(), &wallet)
    }

    async fn get_all(&self) -> Result<Vec<Wallet>> {
        self.scan(CF_WALLETS)
    }
}

#[async_trait]
impl ChallengeStore for RocksDBStore {
    async fn read(&self, id: ChallengeId) -> Result<Option<Challenge>> {
        self.fetch(CF_CHALLENGES, id.value().as_bytes())
    }

    async fn save(&self, challenge: Challenge) -> Result<()> {
        self.put_value(CF_CHALLENGES, challenge.id().value().as_bytes(), &challenge)
    }
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn save(&self, transaction: Transaction) -> Result<()> {
        self.put_value(CF_TRANSACTIONS, transaction.id().value().as_bytes(), &transaction)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.fetch(CF_TRANSACTIONS, id.value().as_bytes())
    }

    async fn by_reference(&self, reference: ReferenceId) -> Result<Vec<Transaction>> {
        let all: Vec<Transaction> = self.scan(CF_TRANSACTIONS)?;
        Ok(all
            .into_iter()
            .filter(|tx| tx.reference_id() == reference)
            .collect())
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn save(&self, entry: LedgerEntry) -> Result<()> {
        self.put_value(CF_LEDGER_ENTRIES, entry.id().value().as_bytes(), &entry)
    }

    async fn entries_for(&self, account: AccountRef) -> Result<Vec<LedgerEntry>> {
        let all: Vec<LedgerEntry> = self.scan(CF_LEDGER_ENTRIES)?;
        Ok(all
            .into_iter()
            .filter(|entry| entry.account() == account)
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for RocksDBStore {
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut batch = WriteBatch::default();

        if let Some(challenge) = &changes.challenge {
            batch.put_cf(
                self.cf(CF_CHALLENGES)?,
                challenge.id().value().as_bytes(),
                encode(challenge)?,
            );
        }
        for wallet in &changes.wallets {
            batch.put_cf(
                self.cf(CF_WALLETS)?,
                wallet.owner().value().as_bytes(),
                encode(wallet)?,
            );
        }
        if let Some(tx) = &changes.transaction {
            if self.contains(CF_TRANSACTIONS, tx.id().value().as_bytes())? {
                return Err(conflict(format!("transaction {} already recorded", tx.id())));
            }
            for entry in tx.entries() {
                if self.contains(CF_LEDGER_ENTRIES, entry.id().value().as_bytes())? {
                    return Err(conflict(format!("ledger entry {} already recorded", entry.id())));
                }
            }
            batch.put_cf(
                self.cf(CF_TRANSACTIONS)?,
                tx.id().value().as_bytes(),
                encode(tx)?,
            );
            for entry in tx.entries() {
                batch.put_cf(
                    self.cf(CF_LEDGER_ENTRIES)?,
                    entry.id().value().as_bytes(),
                    encode(entry)?,
                );
            }
        }

        self.db.write(batch)?;
        Ok(())
    }
}
