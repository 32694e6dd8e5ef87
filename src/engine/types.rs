use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::types::PlayerId;

/// Game phases in graph order. DAY, VOTING and NIGHT cycle until a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    Shuffling,
    Reveal,
    Day,
    Voting,
    Night,
    Ended,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Ended)
    }

    /// Phases gated by a deadline; LOBBY waits on players, ENDED is final.
    pub fn has_deadline(self) -> bool {
        !matches!(self, Phase::Lobby | Phase::Ended)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    TownWins,
    MafiaWins,
    Draw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationCause {
    Voted,
    NightKill,
}

/// Per-player progress bits, mutated by the respective operations. The
/// cyclic bits (voted, night_*) reset at each phase entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFlags {
    pub active: bool,
    pub deck_committed: bool,
    pub shared_keys: bool,
    pub role_committed: bool,
    pub confirmed_role: bool,
    pub voted: bool,
    pub night_committed: bool,
    pub night_revealed: bool,
    pub claimed_mafia: bool,
}

/// A room participant. Never deleted: eliminated or kicked players stay on
/// the roster (inactive) so historical participation remains auditable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub address: String,
    pub nickname: String,
    pub public_key: String,
    pub joined_at: DateTime<Utc>,
    pub flags: PlayerFlags,
}

impl PlayerRecord {
    pub fn new(
        id: PlayerId,
        address: impl Into<String>,
        nickname: impl Into<String>,
        public_key: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            nickname: nickname.into(),
            public_key: public_key.into(),
            joined_at,
            flags: PlayerFlags {
                active: true,
                ..PlayerFlags::default()
            },
        }
    }

    pub fn is_alive(&self) -> bool {
        self.flags.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;
    use chrono::TimeZone;

    #[test]
    fn enums_round_trip_with_serde() {
        assert_round_trip_eq(&Phase::Voting);
        assert_round_trip_eq(&Verdict::MafiaWins);
        assert_round_trip_eq(&EliminationCause::NightKill);
    }

    #[test]
    fn player_record_round_trips_with_serde() {
        let joined = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let record = PlayerRecord::new(3, "0xabc", "dana", "04deadbeef", joined);
        assert!(record.is_alive());
        assert_round_trip_eq(&record);
    }

    #[test]
    fn deadline_phases_exclude_lobby_and_ended() {
        assert!(!Phase::Lobby.has_deadline());
        assert!(!Phase::Ended.has_deadline());
        for phase in [Phase::Shuffling, Phase::Reveal, Phase::Day, Phase::Voting, Phase::Night] {
            assert!(phase.has_deadline());
        }
    }
}
