use crate::domain::challenge::Challenge;
use crate::domain::money::{FeeRate, Token};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Platform fee fractions. One schedule is configured per engine and stamped
/// on each challenge when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Retained by the platform on confirm and on late viewer rejects.
    pub commission: FeeRate,
    /// Paid to the streamer when the viewer backs out mid-challenge.
    pub streamer_inspirit: FeeRate,
    /// Fraction of the duration within which a viewer reject is free.
    pub full_refund_window: FeeRate,
}

impl FeeSchedule {
    pub const DEFAULT: Self = Self {
        commission: FeeRate::percent(10),
        streamer_inspirit: FeeRate::percent(20),
        full_refund_window: FeeRate::percent(30),
    };

    pub fn validate(&self) -> Result<()> {
        if self.commission.value() + self.streamer_inspirit.value() > Decimal::ONE {
            return Err(EscrowError::ConfigError(format!(
                "commission ({}) plus streamer inspirit ({}) must not exceed 1",
                self.commission, self.streamer_inspirit
            )));
        }
        Ok(())
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Where an escrowed stake goes. The three parts always sum to the stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub viewer: Token,
    pub streamer: Token,
    pub commission: Token,
}

impl Payout {
    pub fn refund(amount: Token) -> Self {
        Self {
            viewer: amount,
            streamer: Token::ZERO,
            commission: Token::ZERO,
        }
    }

    /// Splits the stake of a viewer-rejected challenge according to how much
    /// of its duration has elapsed at `now`. All fractions are the ones
    /// stamped on the challenge at creation.
    pub fn viewer_reject(challenge: &Challenge, now: DateTime<Utc>) -> Result<Self> {
        let amount = challenge.amount();
        let elapsed = challenge.elapsed(now).num_milliseconds();
        let duration = challenge.duration().num_milliseconds();
        let window = challenge.full_refund_window().value() * Decimal::from(duration);

        if Decimal::from(elapsed) <= window {
            return Ok(Self::refund(amount));
        }
        let commission = amount.scale(challenge.fee());
        if elapsed >= duration {
            return Ok(Self {
                viewer: amount.checked_sub(commission)?,
                streamer: Token::ZERO,
                commission,
            });
        }
        let streamer = amount.scale(challenge.streamer_inspirit());
        Ok(Self {
            viewer: amount.checked_sub(commission)?.checked_sub(streamer)?,
            streamer,
            commission,
        })
    }

    /// Splits the stake of a confirmed challenge: commission to the
    /// platform, the rest to the streamer.
    pub fn confirm(challenge: &Challenge) -> Result<Self> {
        let amount = challenge.amount();
        let commission = amount.scale(challenge.fee());
        Ok(Self {
            viewer: Token::ZERO,
            streamer: amount.checked_sub(commission)?,
            commission,
        })
    }

    pub fn total(&self) -> Token {
        self.viewer + self.streamer + self.commission
    }

    pub fn is_full_refund(&self) -> bool {
        self.streamer.is_zero() && self.commission.is_zero()
    }
}
