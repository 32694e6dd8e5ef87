use serde::{Deserialize, Serialize};

use super::types::{EliminationCause, Phase, Verdict};
use crate::commitment::payload::NightAction;
use crate::ledger::types::{CommitHash, PlayerId, RoomId};
use crate::shuffle::deck::Role;

/// Everything a polling or subscribing client can observe. One event per
/// accepted sub-transition, appended to the room's log in order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    RoomCreated {
        room_id: RoomId,
        name: String,
        host: PlayerId,
    },
    PlayerJoined {
        player: PlayerId,
        nickname: String,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        day: u32,
    },
    DeckCommitted {
        player: PlayerId,
        hash: CommitHash,
    },
    DeckRevealed {
        player: PlayerId,
        shuffler_index: usize,
    },
    KeysShared {
        player: PlayerId,
    },
    RoleCommitted {
        player: PlayerId,
        hash: CommitHash,
    },
    RoleConfirmed {
        player: PlayerId,
    },
    VoteCast {
        voter: PlayerId,
        target: PlayerId,
    },
    VotingFinalized {
        eliminated: Option<PlayerId>,
    },
    NightActionCommitted {
        player: PlayerId,
        hash: CommitHash,
    },
    NightActionRevealed {
        player: PlayerId,
        action: NightAction,
        target: Option<PlayerId>,
    },
    MafiaTargetCommitted {
        player: PlayerId,
        hash: CommitHash,
    },
    MafiaTargetRevealed {
        player: PlayerId,
        target: PlayerId,
    },
    NightFinalized {
        killed: Option<PlayerId>,
    },
    PlayerEliminated {
        player: PlayerId,
        cause: EliminationCause,
    },
    PlayerKicked {
        player: PlayerId,
    },
    RoleRevealed {
        player: PlayerId,
        role: Role,
    },
    GameEnded {
        verdict: Verdict,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn events_round_trip_with_serde() {
        assert_round_trip_eq(&RoomEvent::PhaseChanged {
            from: Phase::Day,
            to: Phase::Voting,
            day: 2,
        });
        assert_round_trip_eq(&RoomEvent::NightActionRevealed {
            player: 1,
            action: NightAction::Heal,
            target: Some(4),
        });
        assert_round_trip_eq(&RoomEvent::GameEnded {
            verdict: Verdict::TownWins,
        });
    }
}
