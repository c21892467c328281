use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// One line of the final report.
#[derive(Debug, Serialize, PartialEq, Clone)]
pub struct BalanceLine {
    pub account: String,
    pub balance: Decimal,
}

impl BalanceLine {
    pub fn new(account: impl Into<String>, balance: Decimal) -> Self {
        Self {
            account: account.into(),
            balance: balance.normalize(),
        }
    }
}

/// Writes balances as `account,balance` CSV.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_lines(&mut self, lines: impl IntoIterator<Item = BalanceLine>) -> Result<()> {
        for line in lines {
            self.writer.serialize(line)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
