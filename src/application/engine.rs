use crate::application::lifecycle::ChallengeLifecycleService;
use crate::domain::challenge::{Challenge, ChallengeTerms, Description, Title};
use crate::domain::ids::{ChallengeId, ReferenceId, UserId};
use crate::domain::ledger::{AccountRef, account_balance};
use crate::domain::money::Token;
use crate::domain::ports::{
    AuthorizationGateRef, ChallengeAction, ChallengeStore, ChallengeStoreBox, ChangeSet,
    LedgerStore, LedgerStoreBox, TransactionStore, TransactionStoreBox, UnitOfWork,
    UnitOfWorkBox, WalletStore, WalletStoreBox,
};
use crate::domain::transaction::Transaction;
use crate::domain::wallet::Wallet;
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The persistence ports the engine runs against.
pub struct Stores {
    pub wallets: WalletStoreBox,
    pub challenges: ChallengeStoreBox,
    pub transactions: TransactionStoreBox,
    pub ledger: LedgerStoreBox,
    pub unit_of_work: UnitOfWorkBox,
}

impl Stores {
    /// Boxes one backend that implements every port, sharing its state.
    pub fn shared<S>(store: S) -> Self
    where
        S: WalletStore
            + ChallengeStore
            + TransactionStore
            + LedgerStore
            + UnitOfWork
            + Clone
            + 'static,
    {
        Self {
            wallets: Box::new(store.clone()),
            challenges: Box::new(store.clone()),
            transactions: Box::new(store.clone()),
            ledger: Box::new(store.clone()),
            unit_of_work: Box::new(store),
        }
    }
}

/// The main entry point for challenge and wallet commands.
///
/// `ChallengeEngine` loads what a command needs, asks the authorization gate,
/// hands the loaded copies to the [`ChallengeLifecycleService`] and commits
/// the resulting [`ChangeSet`] in one step. Commands are serialised on a
/// writer lock held from the first wallet read to the commit, which is the
/// scope of every exclusive wallet lock.
pub struct ChallengeEngine {
    stores: Stores,
    lifecycle: ChallengeLifecycleService,
    gate: AuthorizationGateRef,
    writer: Mutex<()>,
}

impl ChallengeEngine {
    pub fn new(stores: Stores, lifecycle: ChallengeLifecycleService, gate: AuthorizationGateRef) -> Self {
        Self {
            stores,
            lifecycle,
            gate,
            writer: Mutex::new(()),
        }
    }

    /// Opens an empty wallet for a new user.
    pub async fn open_wallet(&self, owner: UserId) -> Result<Wallet> {
        let _guard = self.writer.lock().await;
        if self.stores.wallets.read(owner, true).await?.is_some() {
            return Err(EscrowError::DomainRule(format!(
                "Wallet already exists for user {owner}"
            )));
        }
        let wallet = Wallet::open(owner, self.lifecycle.now());
        self.commit(ChangeSet {
            wallets: vec![wallet.clone()],
            ..ChangeSet::default()
        })
        .await?;
        info!(%owner, "wallet opened");
        Ok(wallet)
    }

    pub async fn deposit(&self, owner: UserId, amount: Token, reference: ReferenceId) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut wallet = self.lock_wallet(owner).await?;
        let tx = self.lifecycle.deposit(&mut wallet, amount, reference)?;
        self.commit_transaction(None, vec![wallet], tx.clone()).await?;
        info!(%owner, %amount, "deposit settled");
        Ok(tx)
    }

    pub async fn withdraw(&self, owner: UserId, amount: Token, reference: ReferenceId) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut wallet = self.lock_wallet(owner).await?;
        let tx = self.lifecycle.withdraw(&mut wallet, amount, reference)?;
        self.commit_transaction(None, vec![wallet], tx.clone()).await?;
        info!(%owner, %amount, "withdrawal settled");
        Ok(tx)
    }

    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Token,
        reference: ReferenceId,
    ) -> Result<Transaction> {
        if from == to {
            return Err(EscrowError::SameWallet);
        }
        let _guard = self.writer.lock().await;
        let mut sender = self.lock_wallet(from).await?;
        let mut recipient = self.lock_wallet(to).await?;
        let tx = self
            .lifecycle
            .transfer(&mut sender, &mut recipient, amount, reference)?;
        self.commit_transaction(None, vec![sender, recipient], tx.clone()).await?;
        info!(%from, %to, %amount, "transfer settled");
        Ok(tx)
    }

    /// Creates a challenge on behalf of `actor` and locks its stake.
    pub async fn create_challenge(&self, actor: UserId, terms: ChallengeTerms) -> Result<(Challenge, Transaction)> {
        let _guard = self.writer.lock().await;
        self.lock_wallet(terms.assigned_to).await?;
        let mut viewer = self.lock_wallet(terms.created_by).await?;
        let (challenge, tx) = self.lifecycle.create_challenge(terms, &mut viewer)?;
        self.authorize(actor, ChallengeAction::Create, &challenge)?;

        self.commit_transaction(Some(challenge.clone()), vec![viewer], tx.clone())
            .await?;
        info!(
            challenge = %challenge.id(),
            amount = %challenge.amount(),
            status = %challenge.status(),
            "challenge created"
        );
        Ok((challenge, tx))
    }

    pub async fn accept(&self, actor: UserId, id: ChallengeId) -> Result<Challenge> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::Accept, &challenge)?;
        self.lifecycle.accept(&mut challenge)?;
        self.commit_challenge(challenge).await
    }

    pub async fn streamer_reject(&self, actor: UserId, id: ChallengeId) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::StreamerReject, &challenge)?;
        let mut viewer = self.lock_wallet(challenge.created_by()).await?;
        let tx = self.lifecycle.streamer_reject(&mut challenge, &mut viewer)?;
        self.settle(challenge, vec![viewer], tx).await
    }

    pub async fn viewer_reject(&self, actor: UserId, id: ChallengeId) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::ViewerReject, &challenge)?;
        let mut viewer = self.lock_wallet(challenge.created_by()).await?;
        let mut streamer = self.lock_wallet(challenge.assigned_to()).await?;
        let tx = self
            .lifecycle
            .viewer_reject(&mut challenge, &mut viewer, &mut streamer)?;
        self.settle(challenge, vec![viewer, streamer], tx).await
    }

    pub async fn streamer_complete(&self, actor: UserId, id: ChallengeId) -> Result<Challenge> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::StreamerComplete, &challenge)?;
        self.lifecycle.streamer_complete(&mut challenge)?;
        self.commit_challenge(challenge).await
    }

    pub async fn viewer_confirm(&self, actor: UserId, id: ChallengeId) -> Result<Transaction> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::ViewerConfirm, &challenge)?;
        let mut streamer = self.lock_wallet(challenge.assigned_to()).await?;
        let tx = self.lifecycle.viewer_confirm(&mut challenge, &mut streamer)?;
        self.settle(challenge, vec![streamer], tx).await
    }

    pub async fn update_content(
        &self,
        actor: UserId,
        id: ChallengeId,
        title: Title,
        description: Option<Description>,
    ) -> Result<Challenge> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::UpdateContent, &challenge)?;
        self.lifecycle
            .update_content(&mut challenge, title, description)?;
        self.commit_challenge(challenge).await
    }

    /// Changes the stake; returns the escrow adjustment if the amount moved.
    pub async fn update_amount(
        &self,
        actor: UserId,
        id: ChallengeId,
        amount: Token,
    ) -> Result<Option<Transaction>> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::UpdateAmount, &challenge)?;
        let mut viewer = self.lock_wallet(challenge.created_by()).await?;
        let tx = self
            .lifecycle
            .update_amount(&mut challenge, amount, &mut viewer)?;
        match tx {
            Some(tx) => self.settle(challenge, vec![viewer], tx).await.map(Some),
            None => self.commit_challenge(challenge).await.map(|_| None),
        }
    }

    pub async fn extend_deadline(
        &self,
        actor: UserId,
        id: ChallengeId,
        expires_at: DateTime<Utc>,
    ) -> Result<Challenge> {
        let _guard = self.writer.lock().await;
        let mut challenge = self.load(id).await?;
        self.authorize(actor, ChallengeAction::ExtendDeadline, &challenge)?;
        self.lifecycle.extend_deadline(&mut challenge, expires_at)?;
        self.commit_challenge(challenge).await
    }

    pub async fn challenge(&self, id: ChallengeId) -> Result<Challenge> {
        self.stores
            .challenges
            .read(id)
            .await?
            .ok_or_else(|| EscrowError::not_found("Challenge", id))
    }

    pub async fn wallet(&self, owner: UserId) -> Result<Wallet> {
        self.stores
            .wallets
            .read(owner, false)
            .await?
            .ok_or_else(|| EscrowError::not_found("Wallet", owner))
    }

    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        self.stores.wallets.get_all().await
    }

    /// Every transaction settling `reference`, in creation order.
    pub async fn transactions_for(&self, reference: ReferenceId) -> Result<Vec<Transaction>> {
        self.stores.transactions.by_reference(reference).await
    }

    /// Position of `account` rebuilt from its ledger entries.
    pub async fn account_balance(&self, account: AccountRef) -> Result<Decimal> {
        let entries = self.stores.ledger.entries_for(account).await?;
        Ok(account_balance(&entries, account))
    }

    async fn load(&self, id: ChallengeId) -> Result<Challenge> {
        self.challenge(id).await
    }

    async fn lock_wallet(&self, owner: UserId) -> Result<Wallet> {
        debug!(%owner, "locking wallet");
        self.stores
            .wallets
            .read(owner, true)
            .await?
            .ok_or_else(|| EscrowError::not_found("Wallet", owner))
    }

    fn authorize(&self, actor: UserId, action: ChallengeAction, challenge: &Challenge) -> Result<()> {
        if self.gate.allowed(actor, action, challenge) {
            return Ok(());
        }
        warn!(%actor, %action, challenge = %challenge.id(), "authorization denied");
        Err(EscrowError::Forbidden {
            actor: actor.to_string(),
            action: action.to_string(),
        })
    }

    async fn settle(&self, challenge: Challenge, wallets: Vec<Wallet>, tx: Transaction) -> Result<Transaction> {
        let (id, status) = (challenge.id(), challenge.status());
        self.commit_transaction(Some(challenge), wallets, tx.clone())
            .await?;
        info!(challenge = %id, %status, transaction = %tx.id(), amount = %tx.amount(), "escrow settled");
        Ok(tx)
    }

    async fn commit_challenge(&self, challenge: Challenge) -> Result<Challenge> {
        self.commit(ChangeSet {
            challenge: Some(challenge.clone()),
            ..ChangeSet::default()
        })
        .await?;
        info!(challenge = %challenge.id(), status = %challenge.status(), "challenge updated");
        Ok(challenge)
    }

    async fn commit_transaction(
        &self,
        challenge: Option<Challenge>,
        wallets: Vec<Wallet>,
        tx: Transaction,
    ) -> Result<()> {
        self.commit(ChangeSet {
            challenge,
            wallets,
            transaction: Some(tx),
        })
        .await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        self.stores.unit_of_work.commit(changes).await
    }
}
