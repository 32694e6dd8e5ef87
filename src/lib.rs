pub mod client;
pub mod commitment;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod ledger;
pub mod shuffle;

#[cfg(test)]
pub mod test_utils;

pub use engine::{Phase, ProtocolError, RoomEvent, RoomSnapshot, Verdict};
pub use ledger::{InMemoryLedger, LedgerError};
pub use shuffle::Role;
