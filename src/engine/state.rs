use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ProtocolError;
use super::types::{Phase, PlayerRecord, Verdict};
use crate::commitment::payload::{
    DeckPayload, MafiaTargetPayload, NightActionPayload, RolePayload,
};
use crate::commitment::Commitment;
use crate::config::RoomConfig;
use crate::ledger::types::{PlayerId, RoomId};
use crate::shuffle::deck::Deck;

/// The per-room aggregate root. Owned exclusively by the ledger; every
/// mutation goes through a transition method and either fully applies or is
/// fully rejected. Progress counters are recomputed from player flags and
/// commitment maps on demand, never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    pub room_id: RoomId,
    pub name: String,
    pub config: RoomConfig,
    pub phase: Phase,
    pub day_count: u32,
    pub created_at: DateTime<Utc>,
    pub phase_entered_at: DateTime<Utc>,
    pub phase_deadline: Option<DateTime<Utc>>,
    pub host: PlayerId,
    pub players: Vec<PlayerRecord>,
    /// Index into `players` of the shuffle-turn holder; == players.len()
    /// once every turn has completed.
    pub current_shuffler: usize,
    /// Latest revealed deck; empty until the first shuffler reveals.
    pub deck: Deck,
    pub deck_commits: BTreeMap<PlayerId, Commitment<DeckPayload>>,
    pub role_commits: BTreeMap<PlayerId, Commitment<RolePayload>>,
    /// Cleared at each NIGHT entry.
    pub night_commits: BTreeMap<PlayerId, Commitment<NightActionPayload>>,
    /// Cleared at each NIGHT entry.
    pub mafia_commits: BTreeMap<PlayerId, Commitment<MafiaTargetPayload>>,
    /// Cleared at each VOTING entry.
    pub votes: BTreeMap<PlayerId, PlayerId>,
    /// sender -> (recipient -> opaque encrypted key blob).
    pub key_shares: BTreeMap<PlayerId, BTreeMap<PlayerId, String>>,
    pub verdict: Option<Verdict>,
}

impl RoomState {
    // ---- roster access ----------------------------------------------------

    pub fn player(&self, id: PlayerId) -> Result<&PlayerRecord, ProtocolError> {
        self.players
            .get(id as usize)
            .ok_or(ProtocolError::NotParticipant)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerRecord, ProtocolError> {
        self.players
            .get_mut(id as usize)
            .ok_or(ProtocolError::NotParticipant)
    }

    /// Participant check + alive check, the common op precondition.
    pub fn alive_player(&self, id: PlayerId) -> Result<&PlayerRecord, ProtocolError> {
        let player = self.player(id)?;
        if !player.is_alive() {
            return Err(ProtocolError::PlayerInactive);
        }
        Ok(player)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn alive_count(&self) -> usize {
        self.alive_players().count()
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.players
            .get(id as usize)
            .map(|p| p.is_alive())
            .unwrap_or(false)
    }

    /// Caller's position among alive players, ordered by join index.
    pub fn alive_rank(&self, id: PlayerId) -> Option<usize> {
        self.alive_players().position(|p| p.id == id)
    }

    pub fn current_shuffler_id(&self) -> Option<PlayerId> {
        self.players
            .get(self.current_shuffler)
            .map(|p| p.id)
    }

    // ---- recomputed counters ----------------------------------------------

    pub fn confirmed_count(&self) -> usize {
        self.alive_players().filter(|p| p.flags.confirmed_role).count()
    }

    pub fn keys_shared_count(&self) -> usize {
        self.alive_players().filter(|p| p.flags.shared_keys).count()
    }

    pub fn voted_count(&self) -> usize {
        self.alive_players().filter(|p| p.flags.voted).count()
    }

    pub fn night_committed_count(&self) -> usize {
        self.alive_players().filter(|p| p.flags.night_committed).count()
    }

    pub fn night_revealed_count(&self) -> usize {
        self.alive_players().filter(|p| p.flags.night_revealed).count()
    }

    /// Mafia-consensus aggregate over currently-alive claimed mafia.
    pub fn mafia_consensus(&self) -> MafiaConsensus {
        let mut committed = 0usize;
        let mut revealed = 0usize;
        let mut target: Option<PlayerId> = None;
        let mut unanimous = true;

        for player in self.alive_players() {
            let Some(commitment) = self.mafia_commits.get(&player.id) else {
                continue;
            };
            committed += 1;
            if let Some(payload) = commitment.revealed() {
                revealed += 1;
                match target {
                    None => target = Some(payload.target),
                    Some(t) if t != payload.target => unanimous = false,
                    Some(_) => {}
                }
            }
        }

        let consensus_target =
            (committed > 0 && revealed == committed && unanimous).then_some(target).flatten();
        MafiaConsensus {
            committed_count: committed,
            revealed_count: revealed,
            consensus_target,
        }
    }

    // ---- guards -----------------------------------------------------------

    pub fn require_phase(&self, phase: Phase) -> Result<(), ProtocolError> {
        if self.phase != phase {
            return Err(ProtocolError::WrongPhase { phase: self.phase });
        }
        Ok(())
    }

    /// Reject operations submitted after the current phase deadline; only
    /// the force-timeout escape hatch is honored past it.
    pub fn require_before_deadline(&self, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        match self.phase_deadline {
            Some(deadline) if now > deadline => Err(ProtocolError::DeadlineExpired),
            _ => Ok(()),
        }
    }

    // ---- snapshots --------------------------------------------------------

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id,
            name: self.name.clone(),
            phase: self.phase,
            day_count: self.day_count,
            phase_deadline: self.phase_deadline,
            current_shuffler: (self.phase == Phase::Shuffling)
                .then(|| self.current_shuffler_id())
                .flatten(),
            player_count: self.players.len(),
            alive_count: self.alive_count(),
            confirmed_count: self.confirmed_count(),
            keys_shared_count: self.keys_shared_count(),
            voted_count: self.voted_count(),
            night_committed_count: self.night_committed_count(),
            night_revealed_count: self.night_revealed_count(),
            verdict: self.verdict,
        }
    }
}

/// Read-only room overview for polling clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub name: String,
    pub phase: Phase,
    pub day_count: u32,
    pub phase_deadline: Option<DateTime<Utc>>,
    pub current_shuffler: Option<PlayerId>,
    pub player_count: usize,
    pub alive_count: usize,
    pub confirmed_count: usize,
    pub keys_shared_count: usize,
    pub voted_count: usize,
    pub night_committed_count: usize,
    pub night_revealed_count: usize,
    pub verdict: Option<Verdict>,
}

/// Mafia-target aggregate exposed for polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MafiaConsensus {
    pub committed_count: usize,
    pub revealed_count: usize,
    pub consensus_target: Option<PlayerId>,
}

/// Commitment status row for the per-schema status query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentStatus {
    pub player: PlayerId,
    pub committed_at: DateTime<Utc>,
    pub revealed: bool,
}
