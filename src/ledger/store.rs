//! In-memory reference implementation of the abstract game ledger.
//!
//! The real trust anchor is an external append-only ledger with atomic state
//! transitions keyed by room id; this store implements the same contract for
//! tests, simulations and local play. Mutations apply on a staged copy of
//! the room and commit only when the transition succeeds, so a rejected call
//! can never leave partial state behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::commitment::payload::NightAction;
use crate::config::RoomConfig;
use crate::engine::state::{CommitmentStatus, MafiaConsensus, RoomSnapshot, RoomState};
use crate::engine::types::PlayerRecord;
use crate::engine::{ProtocolError, RoomEvent};
use crate::ledger::types::{CommitHash, EventSeq, PlayerId, RoomId, Salt};
use crate::shuffle::deck::{Deck, Role};

const LOG_TARGET: &str = "mental_mafia::ledger::store";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("room not found")]
    RoomNotFound,
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One accepted event, in room-log order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: EventSeq,
    pub room_id: RoomId,
    pub at: DateTime<Utc>,
    pub event: RoomEvent,
}

/// Which of the four commitment maps a status query addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentKind {
    Deck,
    Role,
    NightAction,
    MafiaTarget,
}

#[derive(Default)]
pub struct InMemoryLedger {
    rooms: RwLock<BTreeMap<RoomId, RoomState>>,
    log: RwLock<Vec<EventRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one transition atomically: stage a copy, apply, commit on success.
    fn apply<F>(
        &self,
        room_id: RoomId,
        now: DateTime<Utc>,
        op: F,
    ) -> Result<Vec<RoomEvent>, LedgerError>
    where
        F: FnOnce(&mut RoomState) -> Result<Vec<RoomEvent>, ProtocolError>,
    {
        let mut rooms = self.rooms.write();
        let room = rooms.get_mut(&room_id).ok_or(LedgerError::RoomNotFound)?;
        let mut staged = room.clone();
        let events = op(&mut staged)?;
        *room = staged;
        self.append(room_id, now, &events);
        Ok(events)
    }

    fn append(&self, room_id: RoomId, at: DateTime<Utc>, events: &[RoomEvent]) {
        let mut log = self.log.write();
        for event in events {
            let seq = log.len() as EventSeq;
            log.push(EventRecord {
                seq,
                room_id,
                at,
                event: event.clone(),
            });
        }
    }

    fn read<T>(
        &self,
        room_id: RoomId,
        f: impl FnOnce(&RoomState) -> T,
    ) -> Result<T, LedgerError> {
        let rooms = self.rooms.read();
        rooms
            .get(&room_id)
            .map(f)
            .ok_or(LedgerError::RoomNotFound)
    }

    // ---- mutating operations ----------------------------------------------

    pub fn create_room(
        &self,
        name: impl Into<String>,
        config: RoomConfig,
        host_nickname: impl Into<String>,
        host_public_key: impl Into<String>,
        host_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<RoomId, LedgerError> {
        let room_id = uuid::Uuid::new_v4();
        let (room, events) = RoomState::create(
            room_id,
            name,
            config,
            host_nickname,
            host_public_key,
            host_address,
            now,
        )
        .map_err(LedgerError::Protocol)?;
        self.rooms.write().insert(room_id, room);
        self.append(room_id, now, &events);
        info!(target: LOG_TARGET, room = %room_id, "room registered");
        Ok(room_id)
    }

    pub fn join_room(
        &self,
        room_id: RoomId,
        address: impl Into<String>,
        nickname: impl Into<String>,
        public_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<PlayerId, LedgerError> {
        let address = address.into();
        let nickname = nickname.into();
        let public_key = public_key.into();
        let mut joined = None;
        self.apply(room_id, now, |room| {
            let (id, events) = room.join(address, nickname, public_key, now)?;
            joined = Some(id);
            Ok(events)
        })?;
        Ok(joined.expect("join success always yields a player id"))
    }

    pub fn start_shuffle(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.start_shuffle(caller, now))
    }

    pub fn commit_deck(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.commit_deck(caller, hash, now))
    }

    pub fn reveal_deck(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        deck: Deck,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.reveal_deck(caller, deck, salt, now))
    }

    pub fn share_decryption_keys(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        shares: BTreeMap<PlayerId, String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.share_decryption_keys(caller, shares, now)
        })
    }

    pub fn commit_role(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.commit_role(caller, hash, now))
    }

    pub fn confirm_role(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.confirm_role(caller, now))
    }

    pub fn start_voting(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.start_voting(caller, now))
    }

    pub fn cast_vote(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        target: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.cast_vote(caller, target, now))
    }

    pub fn commit_night_action(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.commit_night_action(caller, hash, now)
        })
    }

    pub fn reveal_night_action(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        action: NightAction,
        target: Option<PlayerId>,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.reveal_night_action(caller, action, target, salt, now)
        })
    }

    pub fn commit_mafia_target(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.commit_mafia_target(caller, hash, now)
        })
    }

    pub fn reveal_mafia_target(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        target: PlayerId,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.reveal_mafia_target(caller, target, salt, now)
        })
    }

    pub fn force_phase_timeout(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.force_phase_timeout(caller, now))
    }

    pub fn reveal_role_for_endgame(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        role: Role,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| {
            room.reveal_role_for_endgame(caller, role, salt, now)
        })
    }

    pub fn finalize_game(
        &self,
        room_id: RoomId,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, LedgerError> {
        self.apply(room_id, now, |room| room.finalize_game(caller, now))
    }

    // ---- read-only queries ------------------------------------------------

    pub fn snapshot(&self, room_id: RoomId) -> Result<RoomSnapshot, LedgerError> {
        self.read(room_id, |room| room.snapshot())
    }

    pub fn players(&self, room_id: RoomId) -> Result<Vec<PlayerRecord>, LedgerError> {
        self.read(room_id, |room| room.players.clone())
    }

    pub fn commitment_status(
        &self,
        room_id: RoomId,
        kind: CommitmentKind,
    ) -> Result<Vec<CommitmentStatus>, LedgerError> {
        fn rows<P: Clone + crate::commitment::CommitPayload>(
            map: &BTreeMap<PlayerId, crate::commitment::Commitment<P>>,
        ) -> Vec<CommitmentStatus> {
            map.iter()
                .map(|(player, c)| CommitmentStatus {
                    player: *player,
                    committed_at: c.committed_at(),
                    revealed: c.is_revealed(),
                })
                .collect()
        }

        self.read(room_id, |room| match kind {
            CommitmentKind::Deck => rows(&room.deck_commits),
            CommitmentKind::Role => rows(&room.role_commits),
            CommitmentKind::NightAction => rows(&room.night_commits),
            CommitmentKind::MafiaTarget => rows(&room.mafia_commits),
        })
    }

    pub fn mafia_consensus(&self, room_id: RoomId) -> Result<MafiaConsensus, LedgerError> {
        self.read(room_id, |room| room.mafia_consensus())
    }

    pub fn revealed_deck(&self, room_id: RoomId) -> Result<Deck, LedgerError> {
        self.read(room_id, |room| room.deck.clone())
    }

    /// The decryption-key blobs other players have addressed to `recipient`.
    pub fn key_shares_for(
        &self,
        room_id: RoomId,
        recipient: PlayerId,
    ) -> Result<BTreeMap<PlayerId, String>, LedgerError> {
        self.read(room_id, |room| {
            room.key_shares
                .iter()
                .filter_map(|(sender, shares)| {
                    shares.get(&recipient).map(|blob| (*sender, blob.clone()))
                })
                .collect()
        })
    }

    pub fn key_exchange_status(
        &self,
        room_id: RoomId,
    ) -> Result<BTreeMap<PlayerId, bool>, LedgerError> {
        self.read(room_id, |room| {
            room.players
                .iter()
                .map(|p| (p.id, p.flags.shared_keys))
                .collect()
        })
    }

    /// Events for one room from `since` (inclusive), in log order.
    pub fn events_since(&self, room_id: RoomId, since: EventSeq) -> Vec<EventRecord> {
        self.log
            .read()
            .iter()
            .filter(|r| r.room_id == room_id && r.seq >= since)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Phase;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn seeded_room(ledger: &InMemoryLedger, players: usize) -> RoomId {
        let config = RoomConfig {
            min_players: 3,
            max_players: 12,
            ..RoomConfig::default()
        };
        let room = ledger
            .create_room("store-test", config, "host", "pk0", "0x0", now())
            .unwrap();
        for i in 1..players {
            ledger
                .join_room(room, format!("0x{i}"), format!("p{i}"), format!("pk{i}"), now())
                .unwrap();
        }
        room
    }

    #[test]
    fn rejected_operations_leave_state_untouched() {
        let ledger = InMemoryLedger::new();
        let room = seeded_room(&ledger, 4);

        // Voting is illegal in LOBBY; the room must be byte-identical after.
        let before = ledger.snapshot(room).unwrap();
        let err = ledger.cast_vote(room, 0, 1, now()).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Protocol(ProtocolError::WrongPhase { phase: Phase::Lobby })
        ));
        assert_eq!(ledger.snapshot(room).unwrap(), before);
    }

    #[test]
    fn unknown_room_is_a_specific_error() {
        let ledger = InMemoryLedger::new();
        let ghost = uuid::Uuid::new_v4();
        assert_eq!(ledger.snapshot(ghost).unwrap_err(), LedgerError::RoomNotFound);
    }

    #[test]
    fn event_log_is_ordered_and_filterable() {
        let ledger = InMemoryLedger::new();
        let room = seeded_room(&ledger, 3);
        let other = seeded_room(&ledger, 3);

        let events = ledger.events_since(room, 0);
        assert!(matches!(events[0].event, RoomEvent::RoomCreated { .. }));
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
        assert!(events.iter().all(|r| r.room_id == room));

        let later = ledger.events_since(other, 0);
        assert!(later.iter().all(|r| r.room_id == other));
    }

    #[test]
    fn join_assigns_sequential_ids_and_auto_start_fills_the_room() {
        let ledger = InMemoryLedger::new();
        let config = RoomConfig {
            min_players: 3,
            max_players: 3,
            ..RoomConfig::default()
        };
        let room = ledger
            .create_room("small", config, "host", "pk0", "0x0", now())
            .unwrap();
        assert_eq!(
            ledger.join_room(room, "0x1", "p1", "pk1", now()).unwrap(),
            1
        );
        assert_eq!(
            ledger.join_room(room, "0x2", "p2", "pk2", now()).unwrap(),
            2
        );

        let snapshot = ledger.snapshot(room).unwrap();
        assert_eq!(snapshot.phase, Phase::Shuffling);
        assert_eq!(snapshot.current_shuffler, Some(0));

        assert_eq!(
            ledger.join_room(room, "0x3", "p3", "pk3", now()).unwrap_err(),
            LedgerError::Protocol(ProtocolError::WrongPhase {
                phase: Phase::Shuffling
            })
        );
    }
}
