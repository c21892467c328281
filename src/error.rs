use crate::domain::challenge::ChallengeStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of an [`EscrowError`], used by the boundary to pick
/// a response and decide whether the enclosing unit of work rolls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed value object (400).
    FieldValidation,
    /// Valid values, violated business rule (400/409).
    DomainRule,
    /// Referenced entity is absent (404).
    NotFound,
    /// The authorization gate refused the actor (403).
    Forbidden,
    /// Storage failure (503).
    Persistence,
}

#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid ledger entry: {0}")]
    InvalidLedgerEntry(String),
    #[error("{0}")]
    DomainRule(String),
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: Decimal,
        requested: Decimal,
    },
    #[error("Cannot transfer between the same wallet")]
    SameWallet,
    #[error("Cannot {action} a challenge in status {status}")]
    InvalidTransition {
        action: &'static str,
        status: ChallengeStatus,
    },
    #[error("Challenge cannot be completed after its duration has passed")]
    DurationPassed,
    #[error("Unbalanced transaction: debits {debits} != credits {credits}")]
    Unbalanced { debits: Decimal, credits: Decimal },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Actor {actor} is not allowed to {action}")]
    Forbidden { actor: String, action: String },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl EscrowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_)
            | Self::InvalidLedgerEntry(_)
            | Self::ConfigError(_)
            | Self::CsvError(_) => ErrorKind::FieldValidation,
            Self::DomainRule(_)
            | Self::InsufficientBalance { .. }
            | Self::SameWallet
            | Self::InvalidTransition { .. }
            | Self::DurationPassed
            | Self::Unbalanced { .. } => ErrorKind::DomainRule,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::IoError(_) | Self::InternalError(_) => ErrorKind::Persistence,
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDbError(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EscrowError>;
