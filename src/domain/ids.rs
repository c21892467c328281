use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new(value: Uuid) -> Self {
                Self(value)
            }

            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// A platform user; also the identity of that user's wallet.
    UserId
);
entity_id!(ChallengeId);
entity_id!(TransactionId);
entity_id!(EntryId);
entity_id!(
    /// What a transaction settles: a challenge id, or a payment reference for
    /// deposits and withdrawals.
    ReferenceId
);

impl From<ChallengeId> for ReferenceId {
    fn from(id: ChallengeId) -> Self {
        Self(id.0)
    }
}
