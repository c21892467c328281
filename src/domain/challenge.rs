use crate::domain::fees::FeeSchedule;
use crate::domain::ids::{ChallengeId, UserId};
use crate::domain::money::{FeeRate, Token};
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    StreamerRejected,
    StreamerCompleted,
    ViewerConfirmed,
    ViewerRejected,
    /// Reserved; no transition leads here.
    Refunded,
    Done,
}

impl ChallengeStatus {
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Accepted,
        Self::StreamerRejected,
        Self::StreamerCompleted,
        Self::ViewerConfirmed,
        Self::ViewerRejected,
        Self::Refunded,
        Self::Done,
    ];

    /// The status reached by applying `event`, or `None` if the event is not
    /// allowed from this status.
    pub fn next(self, event: ChallengeEvent) -> Option<Self> {
        use ChallengeEvent as E;
        use ChallengeStatus as S;
        match (self, event) {
            (S::Pending, E::Accept) => Some(S::Accepted),
            (S::Pending, E::StreamerReject) => Some(S::StreamerRejected),
            (S::Pending | S::Accepted, E::ViewerReject) => Some(S::ViewerRejected),
            (S::Accepted, E::StreamerComplete) => Some(S::StreamerCompleted),
            (S::Accepted | S::StreamerCompleted, E::ViewerConfirm) => Some(S::ViewerConfirmed),
            (S::ViewerConfirmed, E::Done) => Some(S::Done),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Done | Self::StreamerRejected | Self::ViewerRejected | Self::Refunded
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::StreamerRejected => "streamer_rejected",
            Self::StreamerCompleted => "streamer_completed",
            Self::ViewerConfirmed => "viewer_confirmed",
            Self::ViewerRejected => "viewer_rejected",
            Self::Refunded => "refunded",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChallengeEvent {
    Accept,
    StreamerReject,
    ViewerReject,
    StreamerComplete,
    ViewerConfirm,
    Done,
}

impl ChallengeEvent {
    pub const ALL: [Self; 6] = [
        Self::Accept,
        Self::StreamerReject,
        Self::ViewerReject,
        Self::StreamerComplete,
        Self::ViewerConfirm,
        Self::Done,
    ];

    fn action(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::StreamerReject => "streamer-reject",
            Self::ViewerReject => "viewer-reject",
            Self::StreamerComplete => "complete",
            Self::ViewerConfirm => "confirm",
            Self::Done => "finish",
        }
    }
}

macro_rules! bounded_text {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const MIN_LEN: usize = 1;
            pub const MAX_LEN: usize = 255;

            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                let len = value.chars().count();
                if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
                    return Err(EscrowError::ValidationError(format!(
                        "{} must be between {} and {} characters",
                        $label,
                        Self::MIN_LEN,
                        Self::MAX_LEN
                    )));
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EscrowError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(text: $name) -> Self {
                text.0
            }
        }
    };
}

bounded_text!(Title, "Title");
bounded_text!(Description, "Description");

/// What a viewer submits when staking on a streamer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeTerms {
    pub title: Title,
    pub description: Option<Description>,
    pub created_by: UserId,
    pub assigned_to: UserId,
    pub amount: Token,
    pub streamer_fixed_amount: Token,
    pub expires_at: DateTime<Utc>,
}

/// The bet between a viewer (`created_by`) and a streamer (`assigned_to`).
///
/// Status changes only through the transition methods, each of which checks
/// its guard before touching any field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Challenge {
    id: ChallengeId,
    title: Title,
    description: Option<Description>,
    created_by: UserId,
    assigned_to: UserId,
    amount: Token,
    fee: FeeRate,
    streamer_inspirit: FeeRate,
    full_refund_window: FeeRate,
    streamer_fixed_amount: Token,
    status: ChallengeStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Builds a `Pending` challenge created at `now`. The fee fractions of
    /// `rates` are stamped on it and govern every later payout.
    pub fn new(id: ChallengeId, terms: ChallengeTerms, rates: FeeSchedule, now: DateTime<Utc>) -> Result<Self> {
        rates.validate()?;
        let challenge = Self {
            id,
            title: terms.title,
            description: terms.description,
            created_by: terms.created_by,
            assigned_to: terms.assigned_to,
            amount: terms.amount,
            fee: rates.commission,
            streamer_inspirit: rates.streamer_inspirit,
            full_refund_window: rates.full_refund_window,
            streamer_fixed_amount: terms.streamer_fixed_amount,
            status: ChallengeStatus::Pending,
            created_at: now,
            expires_at: terms.expires_at,
            accepted_at: None,
            updated_at: now,
        };
        challenge.validate()?;
        Ok(challenge)
    }

    fn validate(&self) -> Result<()> {
        ensure_staked(self.amount)?;
        if self.amount < self.streamer_fixed_amount {
            return Err(EscrowError::DomainRule(format!(
                "Challenge amount must be greater than or equal to {}, but got {}",
                self.streamer_fixed_amount, self.amount
            )));
        }
        if self.created_at > self.expires_at {
            return Err(EscrowError::DomainRule(format!(
                "Challenge created at must be less than or equal to expires at, but got {} and {}",
                self.created_at, self.expires_at
            )));
        }
        if self.created_by == self.assigned_to {
            return Err(EscrowError::DomainRule(
                "Challenge creator cannot be the same as assignee".to_string(),
            ));
        }
        Ok(())
    }

    pub fn id(&self) -> ChallengeId {
        self.id
    }

    pub fn title(&self) -> &Title {
        &self.title
    }

    pub fn description(&self) -> Option<&Description> {
        self.description.as_ref()
    }

    /// The viewer.
    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    /// The streamer.
    pub fn assigned_to(&self) -> UserId {
        self.assigned_to
    }

    pub fn amount(&self) -> Token {
        self.amount
    }

    pub fn fee(&self) -> FeeRate {
        self.fee
    }

    pub fn streamer_inspirit(&self) -> FeeRate {
        self.streamer_inspirit
    }

    pub fn full_refund_window(&self) -> FeeRate {
        self.full_refund_window
    }

    pub fn streamer_fixed_amount(&self) -> Token {
        self.streamer_fixed_amount
    }

    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn accepted_at(&self) -> Option<DateTime<Utc>> {
        self.accepted_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn duration(&self) -> Duration {
        self.expires_at - self.created_at
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Checks that `event` may be applied at `now`, returning the target
    /// status without changing anything.
    pub fn check(&self, event: ChallengeEvent, now: DateTime<Utc>) -> Result<ChallengeStatus> {
        let next = self
            .status
            .next(event)
            .ok_or(EscrowError::InvalidTransition {
                action: event.action(),
                status: self.status,
            })?;
        if event == ChallengeEvent::StreamerComplete && self.elapsed(now) > self.duration() {
            return Err(EscrowError::DurationPassed);
        }
        Ok(next)
    }

    fn apply(&mut self, event: ChallengeEvent, now: DateTime<Utc>) -> Result<()> {
        let next = self.check(event, now)?;
        self.status = next;
        self.updated_at = now;
        if event == ChallengeEvent::Accept {
            self.accepted_at = Some(now);
        }
        Ok(())
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::Accept, now)
    }

    pub fn streamer_reject(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::StreamerReject, now)
    }

    pub fn viewer_reject(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::ViewerReject, now)
    }

    pub fn streamer_complete(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::StreamerComplete, now)
    }

    pub fn viewer_confirm(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::ViewerConfirm, now)
    }

    pub fn done(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.apply(ChallengeEvent::Done, now)
    }

    pub fn update_content(
        &mut self,
        title: Title,
        description: Option<Description>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.status != ChallengeStatus::Pending {
            return Err(EscrowError::DomainRule(
                "Challenge contents can only be updated for PENDING challenges".to_string(),
            ));
        }
        self.title = title;
        self.description = description;
        self.updated_at = now;
        Ok(())
    }

    pub fn check_amount_update(&self, amount: Token) -> Result<()> {
        ensure_staked(amount)?;
        match self.status {
            ChallengeStatus::Pending if amount < self.streamer_fixed_amount => {
                Err(EscrowError::DomainRule(format!(
                    "Challenge amount must be greater than or equal to {}, but got {amount}",
                    self.streamer_fixed_amount
                )))
            }
            ChallengeStatus::Pending => Ok(()),
            ChallengeStatus::Accepted if amount <= self.amount => {
                Err(EscrowError::DomainRule(format!(
                    "New challenge amount ({amount}) must be greater than current amount ({})",
                    self.amount
                )))
            }
            ChallengeStatus::Accepted => Ok(()),
            _ => Err(EscrowError::DomainRule(
                "Challenge amount can only be updated for PENDING or ACCEPTED challenges"
                    .to_string(),
            )),
        }
    }

    pub fn update_amount(&mut self, amount: Token, now: DateTime<Utc>) -> Result<()> {
        self.check_amount_update(amount)?;
        self.amount = amount;
        self.updated_at = now;
        Ok(())
    }

    pub fn extend_deadline(&mut self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if !matches!(
            self.status,
            ChallengeStatus::Pending | ChallengeStatus::Accepted
        ) {
            return Err(EscrowError::DomainRule(
                "Challenge deadline can only be extended for PENDING or ACCEPTED challenges"
                    .to_string(),
            ));
        }
        if expires_at <= self.expires_at {
            return Err(EscrowError::DomainRule(format!(
                "New expiration time ({expires_at}) must be later than current expiration time ({})",
                self.expires_at
            )));
        }
        self.expires_at = expires_at;
        self.updated_at = now;
        Ok(())
    }
}

// Escrow can only be released through a non-zero ledger leg.
fn ensure_staked(amount: Token) -> Result<()> {
    if !amount.is_positive() {
        return Err(EscrowError::DomainRule(format!(
            "Challenge amount must be greater than 0, but got {amount}"
        )));
    }
    Ok(())
}
