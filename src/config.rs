use crate::domain::fees::FeeSchedule;
use crate::domain::money::FeeRate;
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

pub const ENV_COMMISSION_RATE: &str = "ESCROW_COMMISSION_RATE";
pub const ENV_STREAMER_INSPIRIT_RATE: &str = "ESCROW_STREAMER_INSPIRIT_RATE";
pub const ENV_FULL_REFUND_WINDOW: &str = "ESCROW_FULL_REFUND_WINDOW";

/// Engine settings: built-in defaults, then an optional JSON file, then
/// environment overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fees: FeeSchedule,
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            EscrowError::ConfigError(format!("{}: {}", path.display(), e))
        })
    }

    /// Replaces each fee fraction whose key `lookup` resolves.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let fees = &mut self.fees;
        for (key, slot) in [
            (ENV_COMMISSION_RATE, &mut fees.commission),
            (ENV_STREAMER_INSPIRIT_RATE, &mut fees.streamer_inspirit),
            (ENV_FULL_REFUND_WINDOW, &mut fees.full_refund_window),
        ] {
            if let Some(raw) = lookup(key) {
                *slot = parse_rate(key, &raw)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.fees.validate()
    }
}

fn parse_rate(key: &str, raw: &str) -> Result<FeeRate> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|e| EscrowError::ConfigError(format!("{key}={raw}: {e}")))?;
    FeeRate::new(value).map_err(|e| EscrowError::ConfigError(format!("{key}={raw}: {e}")))
}
