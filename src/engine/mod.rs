pub mod errors;
pub mod events;
pub mod rules;
pub mod state;
pub mod transition;
pub mod types;


pub use errors::ProtocolError;
pub use events::RoomEvent;
pub use state::{CommitmentStatus, MafiaConsensus, RoomSnapshot, RoomState};
pub use types::{EliminationCause, Phase, PlayerFlags, PlayerRecord, Verdict};
