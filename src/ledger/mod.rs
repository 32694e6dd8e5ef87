pub mod hash;
pub mod store;
pub mod types;

pub use hash::TranscriptBuilder;
pub use store::{CommitmentKind, EventRecord, InMemoryLedger, LedgerError};
pub use types::{CommitHash, EventSeq, PlayerId, RoomId, Salt};
