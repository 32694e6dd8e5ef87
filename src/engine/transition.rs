//! Phase-machine transitions: one method per external operation.
//!
//! Every method either fully applies (returning the events it produced) or
//! fully rejects with a specific [`ProtocolError`]; the ledger commits the
//! mutated state only on success.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;

use super::errors::ProtocolError;
use super::events::RoomEvent;
use super::rules;
use super::state::RoomState;
use super::types::{EliminationCause, Phase, PlayerRecord, Verdict};
use crate::commitment::payload::{
    DeckPayload, MafiaTargetPayload, NightAction, NightActionPayload, RolePayload,
};
use crate::commitment::{CommitError, Commitment};
use crate::config::RoomConfig;
use crate::ledger::types::{CommitHash, PlayerId, RoomId, Salt};
use crate::shuffle::deck::{Deck, Role};

const LOG_TARGET: &str = "mental_mafia::engine";

impl RoomState {
    // ---- lobby ------------------------------------------------------------

    pub fn create(
        room_id: RoomId,
        name: impl Into<String>,
        config: RoomConfig,
        host_nickname: impl Into<String>,
        host_public_key: impl Into<String>,
        host_address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<RoomEvent>), ProtocolError> {
        if config.min_players < 3 {
            return Err(ProtocolError::InvalidConfig("min_players must be at least 3"));
        }
        if config.min_players > config.max_players {
            return Err(ProtocolError::InvalidConfig(
                "min_players cannot exceed max_players",
            ));
        }

        let name = name.into();
        let host = PlayerRecord::new(
            0,
            host_address,
            host_nickname,
            host_public_key,
            now,
        );
        let host_nickname = host.nickname.clone();
        let room = Self {
            room_id,
            name: name.clone(),
            config,
            phase: Phase::Lobby,
            day_count: 0,
            created_at: now,
            phase_entered_at: now,
            phase_deadline: None,
            host: 0,
            players: vec![host],
            current_shuffler: 0,
            deck: Deck::new(),
            deck_commits: BTreeMap::new(),
            role_commits: BTreeMap::new(),
            night_commits: BTreeMap::new(),
            mafia_commits: BTreeMap::new(),
            votes: BTreeMap::new(),
            key_shares: BTreeMap::new(),
            verdict: None,
        };
        info!(target: LOG_TARGET, room = %room_id, %name, "room created");
        let events = vec![
            RoomEvent::RoomCreated {
                room_id,
                name,
                host: 0,
            },
            RoomEvent::PlayerJoined {
                player: 0,
                nickname: host_nickname,
            },
        ];
        Ok((room, events))
    }

    pub fn join(
        &mut self,
        address: impl Into<String>,
        nickname: impl Into<String>,
        public_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(PlayerId, Vec<RoomEvent>), ProtocolError> {
        self.require_phase(Phase::Lobby)?;
        if self.players.len() >= self.config.max_players {
            return Err(ProtocolError::RoomFull);
        }
        let address = address.into();
        if self.players.iter().any(|p| p.address == address) {
            return Err(ProtocolError::AlreadyJoined);
        }

        let id = self.players.len() as PlayerId;
        let record = PlayerRecord::new(id, address, nickname, public_key, now);
        let nickname = record.nickname.clone();
        self.players.push(record);

        let mut events = vec![RoomEvent::PlayerJoined { player: id, nickname }];
        if self.players.len() == self.config.max_players {
            self.enter_shuffling(now, &mut events);
        }
        Ok((id, events))
    }

    pub fn start_shuffle(
        &mut self,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Lobby)?;
        self.player(caller)?;
        if caller != self.host {
            return Err(ProtocolError::NotHost);
        }
        if self.players.len() < self.config.min_players {
            return Err(ProtocolError::NotEnoughPlayers {
                need: self.config.min_players,
                have: self.players.len(),
            });
        }
        let mut events = Vec::new();
        self.enter_shuffling(now, &mut events);
        Ok(events)
    }

    // ---- shuffle turns ----------------------------------------------------

    pub fn commit_deck(
        &mut self,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Shuffling)?;
        self.alive_player(caller)?;
        if self.current_shuffler_id() != Some(caller) {
            return Err(ProtocolError::NotYourTurn);
        }
        self.require_before_deadline(now)?;
        if self.deck_commits.contains_key(&caller) {
            return Err(CommitError::AlreadyCommitted.into());
        }

        self.deck_commits.insert(caller, Commitment::new(hash, now));
        self.player_mut(caller)?.flags.deck_committed = true;
        Ok(vec![RoomEvent::DeckCommitted { player: caller, hash }])
    }

    pub fn reveal_deck(
        &mut self,
        caller: PlayerId,
        deck: Deck,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Shuffling)?;
        self.alive_player(caller)?;
        if self.current_shuffler_id() != Some(caller) {
            return Err(ProtocolError::NotYourTurn);
        }
        self.require_before_deadline(now)?;
        if deck.len() != self.players.len() {
            return Err(ProtocolError::InvalidDeckLength {
                expected: self.players.len(),
                actual: deck.len(),
            });
        }

        let commitment = self
            .deck_commits
            .get_mut(&caller)
            .ok_or(CommitError::NotCommitted)?;
        commitment.reveal(DeckPayload { deck: deck.clone() }, &salt, now)?;
        self.deck = deck;

        let mut events = vec![RoomEvent::DeckRevealed {
            player: caller,
            shuffler_index: self.current_shuffler,
        }];
        self.advance_shuffle_turn(now, &mut events);
        Ok(events)
    }

    // ---- key exchange & role confirmation ----------------------------------

    pub fn share_decryption_keys(
        &mut self,
        caller: PlayerId,
        shares: BTreeMap<PlayerId, String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Reveal)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if self.player(caller)?.flags.shared_keys {
            return Err(ProtocolError::KeysAlreadyShared);
        }
        let missing = self
            .alive_players()
            .any(|p| p.id != caller && !shares.contains_key(&p.id));
        if missing {
            return Err(ProtocolError::IncompleteKeyShares);
        }

        self.key_shares.insert(caller, shares);
        self.player_mut(caller)?.flags.shared_keys = true;
        let mut events = vec![RoomEvent::KeysShared { player: caller }];
        self.maybe_enter_day_from_reveal(now, &mut events);
        Ok(events)
    }

    pub fn commit_role(
        &mut self,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Reveal)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if self.role_commits.contains_key(&caller) {
            return Err(CommitError::AlreadyCommitted.into());
        }

        self.role_commits.insert(caller, Commitment::new(hash, now));
        self.player_mut(caller)?.flags.role_committed = true;
        Ok(vec![RoomEvent::RoleCommitted { player: caller, hash }])
    }

    pub fn confirm_role(
        &mut self,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Reveal)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if !self.role_commits.contains_key(&caller) {
            return Err(ProtocolError::RoleNotCommitted);
        }
        if self.player(caller)?.flags.confirmed_role {
            return Err(ProtocolError::AlreadyConfirmed);
        }

        self.player_mut(caller)?.flags.confirmed_role = true;
        let mut events = vec![RoomEvent::RoleConfirmed { player: caller }];
        self.maybe_enter_day_from_reveal(now, &mut events);
        Ok(events)
    }

    // ---- day & voting -----------------------------------------------------

    pub fn start_voting(
        &mut self,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Day)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;

        let rank = if caller == self.host {
            0
        } else {
            self.alive_rank(caller).ok_or(ProtocolError::PlayerInactive)?
        };
        let allowed_at = self.phase_entered_at + rules::waterfall_delay(rank, &self.config);
        if now < allowed_at {
            return Err(ProtocolError::TriggerTooEarly);
        }

        let mut events = Vec::new();
        self.enter_voting(now, &mut events);
        Ok(events)
    }

    pub fn cast_vote(
        &mut self,
        caller: PlayerId,
        target: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Voting)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if self.player(caller)?.flags.voted {
            return Err(ProtocolError::AlreadyVoted);
        }
        if !self.is_alive(target) {
            return Err(ProtocolError::TargetNotAlive);
        }

        self.votes.insert(caller, target);
        self.player_mut(caller)?.flags.voted = true;
        let mut events = vec![RoomEvent::VoteCast { voter: caller, target }];
        if self.voted_count() == self.alive_count() {
            self.finalize_voting(now, &mut events);
        }
        Ok(events)
    }

    // ---- night ------------------------------------------------------------

    pub fn commit_night_action(
        &mut self,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Night)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if self.night_commits.contains_key(&caller) {
            return Err(CommitError::AlreadyCommitted.into());
        }

        self.night_commits.insert(caller, Commitment::new(hash, now));
        self.player_mut(caller)?.flags.night_committed = true;
        Ok(vec![RoomEvent::NightActionCommitted { player: caller, hash }])
    }

    pub fn reveal_night_action(
        &mut self,
        caller: PlayerId,
        action: NightAction,
        target: Option<PlayerId>,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Night)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if action.requires_target() {
            let target = target.ok_or(ProtocolError::MissingActionTarget)?;
            if !self.is_alive(target) {
                return Err(ProtocolError::TargetNotAlive);
            }
        }

        let commitment = self
            .night_commits
            .get_mut(&caller)
            .ok_or(CommitError::NotCommitted)?;
        commitment.reveal(NightActionPayload { action, target }, &salt, now)?;
        self.player_mut(caller)?.flags.night_revealed = true;

        let mut events = vec![RoomEvent::NightActionRevealed {
            player: caller,
            action,
            target,
        }];
        self.try_finalize_night(now, &mut events);
        Ok(events)
    }

    pub fn commit_mafia_target(
        &mut self,
        caller: PlayerId,
        hash: CommitHash,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Night)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if self.mafia_commits.contains_key(&caller) {
            return Err(CommitError::AlreadyCommitted.into());
        }

        self.mafia_commits.insert(caller, Commitment::new(hash, now));
        self.player_mut(caller)?.flags.claimed_mafia = true;
        Ok(vec![RoomEvent::MafiaTargetCommitted { player: caller, hash }])
    }

    pub fn reveal_mafia_target(
        &mut self,
        caller: PlayerId,
        target: PlayerId,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.require_phase(Phase::Night)?;
        self.alive_player(caller)?;
        self.require_before_deadline(now)?;
        if !self.is_alive(target) {
            return Err(ProtocolError::TargetNotAlive);
        }

        let commitment = self
            .mafia_commits
            .get_mut(&caller)
            .ok_or(CommitError::NotCommitted)?;
        commitment.reveal(MafiaTargetPayload { target }, &salt, now)?;

        let mut events = vec![RoomEvent::MafiaTargetRevealed { player: caller, target }];
        self.try_finalize_night(now, &mut events);
        Ok(events)
    }

    // ---- liveness ---------------------------------------------------------

    /// The escape hatch against an uncooperative or disconnected peer. Any
    /// participant may call it once the phase deadline has passed; the
    /// effect depends on the current phase.
    pub fn force_phase_timeout(
        &mut self,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        self.player(caller)?;
        let Some(deadline) = self.phase_deadline else {
            return Err(ProtocolError::NoTimeoutApplicable { phase: self.phase });
        };
        if now <= deadline {
            return Err(ProtocolError::DeadlineNotReached);
        }

        let mut events = Vec::new();
        match self.phase {
            Phase::Shuffling => {
                let stalled = self
                    .current_shuffler_id()
                    .ok_or(ProtocolError::NoTimeoutApplicable { phase: self.phase })?;
                self.kick(stalled, &mut events)?;
                self.advance_shuffle_turn(now, &mut events);
            }
            Phase::Reveal => {
                let stalled: Vec<PlayerId> = self
                    .alive_players()
                    .filter(|p| !(p.flags.shared_keys && p.flags.confirmed_role))
                    .map(|p| p.id)
                    .collect();
                let lost_keys = stalled
                    .iter()
                    .any(|id| !self.player(*id).map(|p| p.flags.shared_keys).unwrap_or(false));
                for id in stalled {
                    self.kick(id, &mut events)?;
                }
                if lost_keys || self.alive_count() < self.config.min_players {
                    // A kicked player's decryption layer is unrecoverable, so
                    // the room cannot continue to a fair reveal.
                    self.end_with(Verdict::Draw, now, &mut events);
                } else {
                    self.day_count = 1;
                    self.enter_phase(Phase::Day, now, &mut events);
                }
            }
            Phase::Day => {
                self.enter_voting(now, &mut events);
            }
            Phase::Voting => {
                self.finalize_voting(now, &mut events);
            }
            Phase::Night => {
                self.finalize_night(now, &mut events);
            }
            Phase::Lobby | Phase::Ended => {
                return Err(ProtocolError::NoTimeoutApplicable { phase: self.phase });
            }
        }
        Ok(events)
    }

    // ---- endgame ----------------------------------------------------------

    pub fn reveal_role_for_endgame(
        &mut self,
        caller: PlayerId,
        role: Role,
        salt: Salt,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        if !matches!(
            self.phase,
            Phase::Day | Phase::Voting | Phase::Night | Phase::Ended
        ) {
            return Err(ProtocolError::WrongPhase { phase: self.phase });
        }
        // Eliminated players may still reveal: the post-game audit needs them.
        self.player(caller)?;

        let commitment = self
            .role_commits
            .get_mut(&caller)
            .ok_or(CommitError::NotCommitted)?;
        commitment.reveal(RolePayload { role }, &salt, now)?;
        Ok(vec![RoomEvent::RoleRevealed { player: caller, role }])
    }

    /// End the game once the alive-player role multiset is fully disclosed
    /// and actually satisfies a win condition. The ledger-verified path is
    /// authoritative; optimistic client checks never end a room.
    pub fn finalize_game(
        &mut self,
        caller: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoomEvent>, ProtocolError> {
        if !matches!(self.phase, Phase::Day | Phase::Voting | Phase::Night) {
            return Err(ProtocolError::WrongPhase { phase: self.phase });
        }
        self.player(caller)?;

        let mut alive_roles = Vec::with_capacity(self.alive_count());
        for player in self.alive_players() {
            let role = self
                .role_commits
                .get(&player.id)
                .and_then(|c| c.revealed())
                .map(|payload| payload.role)
                .ok_or(ProtocolError::RolesNotRevealed)?;
            alive_roles.push(role);
        }

        let verdict = rules::evaluate_verdict(alive_roles).ok_or(ProtocolError::GameNotOver)?;
        let mut events = Vec::new();
        self.end_with(verdict, now, &mut events);
        Ok(events)
    }

    // ---- internal helpers -------------------------------------------------

    fn enter_phase(&mut self, to: Phase, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        let from = self.phase;
        self.phase = to;
        self.phase_entered_at = now;
        self.phase_deadline = to.has_deadline().then(|| {
            let timeout = match to {
                Phase::Shuffling => self.config.turn_timeout(),
                _ => self.config.phase_timeout(),
            };
            now + timeout
        });
        info!(
            target: LOG_TARGET,
            room = %self.room_id,
            ?from,
            ?to,
            day = self.day_count,
            "phase changed"
        );
        events.push(RoomEvent::PhaseChanged {
            from,
            to,
            day: self.day_count,
        });
    }

    fn enter_shuffling(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        self.current_shuffler = 0;
        self.enter_phase(Phase::Shuffling, now, events);
    }

    fn enter_voting(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        self.votes.clear();
        for player in &mut self.players {
            player.flags.voted = false;
        }
        self.enter_phase(Phase::Voting, now, events);
    }

    fn enter_night(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        self.night_commits.clear();
        self.mafia_commits.clear();
        for player in &mut self.players {
            player.flags.night_committed = false;
            player.flags.night_revealed = false;
        }
        self.enter_phase(Phase::Night, now, events);
    }

    /// Move past the current shuffler, skipping inactive players, and either
    /// open the next turn window or complete the shuffle phase.
    fn advance_shuffle_turn(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        self.current_shuffler += 1;
        while self
            .players
            .get(self.current_shuffler)
            .is_some_and(|p| !p.is_alive())
        {
            self.current_shuffler += 1;
        }

        if self.alive_count() < self.config.min_players {
            self.end_with(Verdict::Draw, now, events);
        } else if self.current_shuffler >= self.players.len() {
            self.enter_phase(Phase::Reveal, now, events);
        } else {
            self.phase_deadline = Some(now + self.config.turn_timeout());
        }
    }

    fn maybe_enter_day_from_reveal(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        let alive = self.alive_count();
        if self.confirmed_count() == alive && self.keys_shared_count() == alive {
            self.day_count = 1;
            self.enter_phase(Phase::Day, now, events);
        }
    }

    fn finalize_voting(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        let eliminated = rules::tally_votes(&self.votes, self.alive_count());
        events.push(RoomEvent::VotingFinalized { eliminated });
        if let Some(target) = eliminated {
            if let Ok(player) = self.player_mut(target) {
                player.flags.active = false;
            }
            events.push(RoomEvent::PlayerEliminated {
                player: target,
                cause: EliminationCause::Voted,
            });
        }
        self.enter_night(now, events);
    }

    /// Auto-finalize the night once every alive claimed mafia has revealed a
    /// unanimous target and every night-action commitment is revealed.
    fn try_finalize_night(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        let consensus = self.mafia_consensus();
        if consensus.consensus_target.is_none() {
            return;
        }
        let all_claimed_revealed = self
            .alive_players()
            .filter(|p| p.flags.claimed_mafia)
            .all(|p| {
                self.mafia_commits
                    .get(&p.id)
                    .is_some_and(|c| c.is_revealed())
            });
        let all_actions_revealed = self
            .night_commits
            .values()
            .all(|c| c.is_revealed());
        if all_claimed_revealed && all_actions_revealed {
            self.finalize_night(now, events);
        }
    }

    /// Apply the night outcome from whatever reveals exist: the consensus
    /// kill lands unless a revealed HEAL covers the same target.
    fn finalize_night(&mut self, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        let consensus = self.mafia_consensus();
        let killed = consensus.consensus_target.filter(|target| {
            let healed = self.night_commits.values().any(|c| {
                c.revealed().is_some_and(|p| {
                    p.action == NightAction::Heal && p.target == Some(*target)
                })
            });
            !healed
        });

        events.push(RoomEvent::NightFinalized { killed });
        if let Some(target) = killed {
            if let Ok(player) = self.player_mut(target) {
                player.flags.active = false;
            }
            events.push(RoomEvent::PlayerEliminated {
                player: target,
                cause: EliminationCause::NightKill,
            });
        }
        self.day_count += 1;
        self.enter_phase(Phase::Day, now, events);
    }

    fn kick(&mut self, id: PlayerId, events: &mut Vec<RoomEvent>) -> Result<(), ProtocolError> {
        let player = self.player_mut(id)?;
        player.flags.active = false;
        info!(target: LOG_TARGET, room = %self.room_id, player = id, "player kicked for stalling");
        events.push(RoomEvent::PlayerKicked { player: id });
        Ok(())
    }

    fn end_with(&mut self, verdict: Verdict, now: DateTime<Utc>, events: &mut Vec<RoomEvent>) {
        self.verdict = Some(verdict);
        self.enter_phase(Phase::Ended, now, events);
        events.push(RoomEvent::GameEnded { verdict });
    }
}
