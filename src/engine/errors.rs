use thiserror::Error;

use super::types::Phase;
use crate::commitment::CommitError;

/// Rejection reasons surfaced to callers. Every one is specific so a client
/// can decide between refetch-and-retry and abandoning the action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // -- protocol violations ------------------------------------------------
    #[error("operation is not valid in phase {phase:?}")]
    WrongPhase { phase: Phase },
    #[error("it is not this player's shuffle turn")]
    NotYourTurn,
    #[error("room is already full")]
    RoomFull,
    #[error("this address already joined the room")]
    AlreadyJoined,
    #[error("not enough players to start (need {need}, have {have})")]
    NotEnoughPlayers { need: usize, have: usize },
    #[error("invalid room configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("player already voted this round")]
    AlreadyVoted,
    #[error("decryption keys were already shared")]
    KeysAlreadyShared,
    #[error("role was already confirmed")]
    AlreadyConfirmed,
    #[error("target is not an alive participant")]
    TargetNotAlive,
    #[error("deck has wrong length: expected {expected}, got {actual}")]
    InvalidDeckLength { expected: usize, actual: usize },
    #[error("night action of this type requires a target")]
    MissingActionTarget,
    #[error("decryption key shares must cover every other alive player")]
    IncompleteKeyShares,
    #[error("role must be committed before it can be confirmed")]
    RoleNotCommitted,
    #[error("not every alive player has revealed their role")]
    RolesNotRevealed,
    #[error("win condition is not met")]
    GameNotOver,
    #[error(transparent)]
    Commit(#[from] CommitError),

    // -- authorization ------------------------------------------------------
    #[error("caller is not a participant of this room")]
    NotParticipant,
    #[error("caller is not the room host")]
    NotHost,
    #[error("player has been eliminated or kicked")]
    PlayerInactive,

    // -- liveness -----------------------------------------------------------
    #[error("phase deadline has passed; only force-timeout is honored")]
    DeadlineExpired,
    #[error("phase deadline has not passed yet")]
    DeadlineNotReached,
    #[error("waterfall grace delay has not elapsed for this caller")]
    TriggerTooEarly,
    #[error("no timeout action applies to phase {phase:?}")]
    NoTimeoutApplicable { phase: Phase },
}
