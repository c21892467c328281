use crate::domain::challenge::{Challenge, ChallengeEvent, ChallengeTerms, Description, Title};
use crate::domain::fees::{FeeSchedule, Payout};
use crate::domain::ids::{ChallengeId, ReferenceId, UserId};
use crate::domain::ledger::LedgerEntryFactory;
use crate::domain::money::Token;
use crate::domain::ports::{ClockRef, IdGeneratorRef};
use crate::domain::transaction::{Transaction, TransactionFactory, TransactionType, reason};
use crate::domain::wallet::{self, Wallet};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};

/// Drives challenges through their lifecycle and moves the stake between the
/// viewer, escrow, the streamer and the platform.
///
/// Every operation works on values the caller already loaded. Guards and
/// balance checks run and the transaction is built before anything is
/// mutated, so an `Err` leaves the challenge and wallets as they were. The
/// caller persists the results as one unit.
#[derive(Clone)]
pub struct ChallengeLifecycleService {
    ids: IdGeneratorRef,
    clock: ClockRef,
    fees: FeeSchedule,
    entries: LedgerEntryFactory,
    transactions: TransactionFactory,
}

impl ChallengeLifecycleService {
    pub fn new(ids: IdGeneratorRef, clock: ClockRef, fees: FeeSchedule) -> Self {
        Self {
            entries: LedgerEntryFactory::new(ids.clone(), clock.clone()),
            transactions: TransactionFactory::new(ids.clone(), clock.clone()),
            ids,
            clock,
            fees,
        }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A fresh id for payment references (deposits, withdrawals, transfers).
    pub fn next_reference(&self) -> ReferenceId {
        ReferenceId::new(self.ids.next())
    }

    /// Opens a `Pending` challenge and locks the stake in escrow.
    pub fn create_challenge(
        &self,
        terms: ChallengeTerms,
        viewer: &mut Wallet,
    ) -> Result<(Challenge, Transaction)> {
        let now = self.now();
        ensure_owner(viewer, terms.created_by)?;
        let challenge = Challenge::new(
            ChallengeId::new(self.ids.next()),
            terms,
            self.fees,
            now,
        )?;
        let amount = challenge.amount();
        viewer.ensure_covers(amount)?;

        let tx = self.lock(challenge.id(), viewer.owner(), amount, "Challenge Created")?;
        viewer.debit(amount, now)?;
        Ok((challenge, tx))
    }

    pub fn accept(&self, challenge: &mut Challenge) -> Result<()> {
        challenge.accept(self.now())
    }

    /// The streamer turns the challenge down; the viewer gets everything back.
    pub fn streamer_reject(&self, challenge: &mut Challenge, viewer: &mut Wallet) -> Result<Transaction> {
        let now = self.now();
        challenge.check(ChallengeEvent::StreamerReject, now)?;
        ensure_owner(viewer, challenge.created_by())?;

        let payout = Payout::refund(challenge.amount());
        let tx = self.release(challenge, payout, "Streamer Rejected")?;
        challenge.streamer_reject(now)?;
        settle(payout.viewer, viewer, now)?;
        Ok(tx)
    }

    /// The viewer backs out. What they get back depends on how far into the
    /// challenge's duration `now` is.
    pub fn viewer_reject(
        &self,
        challenge: &mut Challenge,
        viewer: &mut Wallet,
        streamer: &mut Wallet,
    ) -> Result<Transaction> {
        let now = self.now();
        challenge.check(ChallengeEvent::ViewerReject, now)?;
        ensure_owner(viewer, challenge.created_by())?;
        ensure_owner(streamer, challenge.assigned_to())?;

        let payout = Payout::viewer_reject(challenge, now)?;
        let tx = self.release(challenge, payout, "Viewer Rejected")?;
        challenge.viewer_reject(now)?;
        settle(payout.viewer, viewer, now)?;
        settle(payout.streamer, streamer, now)?;
        Ok(tx)
    }

    pub fn streamer_complete(&self, challenge: &mut Challenge) -> Result<()> {
        challenge.streamer_complete(self.now())
    }

    /// Pays the streamer, keeps the commission and closes the challenge.
    pub fn viewer_confirm(&self, challenge: &mut Challenge, streamer: &mut Wallet) -> Result<Transaction> {
        let now = self.now();
        challenge.check(ChallengeEvent::ViewerConfirm, now)?;
        ensure_owner(streamer, challenge.assigned_to())?;

        let payout = Payout::confirm(challenge)?;
        let tx = self.release(challenge, payout, "Viewer Confirmed")?;
        challenge.viewer_confirm(now)?;
        challenge.done(now)?;
        settle(payout.streamer, streamer, now)?;
        Ok(tx)
    }

    pub fn update_content(
        &self,
        challenge: &mut Challenge,
        title: Title,
        description: Option<Description>,
    ) -> Result<()> {
        challenge.update_content(title, description, self.now())
    }

    /// Changes the stake. Escrow follows: an increase locks the difference,
    /// a decrease releases it back to the viewer.
    pub fn update_amount(
        &self,
        challenge: &mut Challenge,
        amount: Token,
        viewer: &mut Wallet,
    ) -> Result<Option<Transaction>> {
        let now = self.now();
        challenge.check_amount_update(amount)?;
        ensure_owner(viewer, challenge.created_by())?;

        let current = challenge.amount();
        let tx = if amount > current {
            let delta = amount.checked_sub(current)?;
            viewer.ensure_covers(delta)?;
            let tx = self.lock(
                challenge.id(),
                viewer.owner(),
                delta,
                "Challenge Amount Increased",
            )?;
            viewer.debit(delta, now)?;
            Some(tx)
        } else if amount < current {
            let delta = current.checked_sub(amount)?;
            let tx = self.transactions.create_transaction(
                TransactionType::EscrowRelease,
                delta,
                challenge.id().into(),
                vec![
                    self.entries.escrow_debit(delta)?,
                    self.entries.user_wallet_credit(viewer.owner(), delta)?,
                ],
                reason("Challenge Amount Decreased"),
            )?;
            viewer.credit(delta, now)?;
            Some(tx)
        } else {
            None
        };
        challenge.update_amount(amount, now)?;
        Ok(tx)
    }

    pub fn extend_deadline(&self, challenge: &mut Challenge, expires_at: DateTime<Utc>) -> Result<()> {
        challenge.extend_deadline(expires_at, self.now())
    }

    /// Settles money coming in from the payment provider.
    pub fn deposit(&self, wallet: &mut Wallet, amount: Token, reference: ReferenceId) -> Result<Transaction> {
        let tx = self.transactions.create_transaction(
            TransactionType::Deposit,
            amount,
            reference,
            vec![
                self.entries.bank_debit(amount)?,
                self.entries.user_wallet_credit(wallet.owner(), amount)?,
            ],
            reason("Deposit"),
        )?;
        wallet.credit(amount, self.now())?;
        Ok(tx)
    }

    pub fn withdraw(&self, wallet: &mut Wallet, amount: Token, reference: ReferenceId) -> Result<Transaction> {
        wallet.ensure_covers(amount)?;
        let tx = self.transactions.create_transaction(
            TransactionType::Withdraw,
            amount,
            reference,
            vec![
                self.entries.user_wallet_debit(wallet.owner(), amount)?,
                self.entries.bank_credit(amount)?,
            ],
            reason("Withdraw"),
        )?;
        wallet.debit(amount, self.now())?;
        Ok(tx)
    }

    pub fn transfer(
        &self,
        from: &mut Wallet,
        to: &mut Wallet,
        amount: Token,
        reference: ReferenceId,
    ) -> Result<Transaction> {
        if from.owner() == to.owner() {
            return Err(EscrowError::SameWallet);
        }
        from.ensure_covers(amount)?;
        let tx = self.transactions.create_transaction(
            TransactionType::Transfer,
            amount,
            reference,
            vec![
                self.entries.user_wallet_debit(from.owner(), amount)?,
                self.entries.user_wallet_credit(to.owner(), amount)?,
            ],
            reason("Transfer"),
        )?;
        wallet::transfer(from, to, amount, self.now())?;
        Ok(tx)
    }

    fn lock(&self, challenge: ChallengeId, viewer: UserId, amount: Token, why: &str) -> Result<Transaction> {
        self.transactions.create_transaction(
            TransactionType::EscrowLock,
            amount,
            challenge.into(),
            vec![
                self.entries.user_wallet_debit(viewer, amount)?,
                self.entries.escrow_credit(amount)?,
            ],
            reason(why),
        )
    }

    /// Empties the challenge's escrow according to `payout`. Zero parts get
    /// no ledger leg.
    fn release(&self, challenge: &Challenge, payout: Payout, why: &str) -> Result<Transaction> {
        let total = payout.total();
        let mut postings = vec![self.entries.escrow_debit(total)?];
        if payout.commission.is_positive() {
            postings.push(self.entries.commission_credit(payout.commission)?);
        }
        if payout.streamer.is_positive() {
            postings.push(
                self.entries
                    .user_wallet_credit(challenge.assigned_to(), payout.streamer)?,
            );
        }
        if payout.viewer.is_positive() {
            postings.push(
                self.entries
                    .user_wallet_credit(challenge.created_by(), payout.viewer)?,
            );
        }
        self.transactions.create_transaction(
            TransactionType::EscrowRelease,
            total,
            challenge.id().into(),
            postings,
            reason(why),
        )
    }
}

fn ensure_owner(wallet: &Wallet, owner: UserId) -> Result<()> {
    if wallet.owner() != owner {
        return Err(EscrowError::DomainRule(format!(
            "Wallet of {} does not belong to participant {owner}",
            wallet.owner()
        )));
    }
    Ok(())
}

fn settle(amount: Token, wallet: &mut Wallet, now: DateTime<Utc>) -> Result<()> {
    if amount.is_positive() {
        wallet.credit(amount, now)?;
    }
    Ok(())
}
