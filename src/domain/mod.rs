//! Domain layer: value objects, entities and the ports the rest of the
//! crate plugs into. Nothing in here performs I/O.

pub mod challenge;
pub mod fees;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod ports;
pub mod transaction;
pub mod wallet;
