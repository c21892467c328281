use crate::domain::ids::UserId;
use crate::domain::money::Token;
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's spendable balance.
///
/// The wallet is identified by its owner. The balance can only change through
/// [`Wallet::credit`], [`Wallet::debit`] and [`transfer`], so it never goes
/// below zero. Callers must hold the wallet under an exclusive lock for the
/// duration of the enclosing unit of work and persist it afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    owner: UserId,
    balance: Token,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Opens an empty wallet, as done once per user at signup.
    pub fn open(owner: UserId, now: DateTime<Utc>) -> Self {
        Self {
            owner,
            balance: Token::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn balance(&self) -> Token {
        self.balance
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Adds funds to the balance.
    pub fn credit(&mut self, amount: Token, now: DateTime<Utc>) -> Result<()> {
        ensure_positive(amount)?;
        self.balance = self.balance + amount;
        self.updated_at = now;
        Ok(())
    }

    /// Removes funds from the balance if sufficient.
    pub fn debit(&mut self, amount: Token, now: DateTime<Utc>) -> Result<()> {
        ensure_positive(amount)?;
        self.ensure_covers(amount)?;
        self.balance = self.balance.checked_sub(amount)?;
        self.updated_at = now;
        Ok(())
    }

    pub(crate) fn ensure_covers(&self, amount: Token) -> Result<()> {
        if self.balance < amount {
            return Err(EscrowError::InsufficientBalance {
                available: self.balance.value(),
                requested: amount.value(),
            });
        }
        Ok(())
    }
}

/// Moves `amount` from one wallet to another. Either both balances change or
/// neither does.
pub fn transfer(from: &mut Wallet, to: &mut Wallet, amount: Token, now: DateTime<Utc>) -> Result<()> {
    if from.owner == to.owner {
        return Err(EscrowError::SameWallet);
    }
    ensure_positive(amount)?;
    from.ensure_covers(amount)?;

    from.debit(amount, now)?;
    to.credit(amount, now)
}

fn ensure_positive(amount: Token) -> Result<()> {
    if !amount.is_positive() {
        return Err(EscrowError::DomainRule("Amount must be positive".to_string()));
    }
    Ok(())
}
