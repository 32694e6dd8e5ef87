//! Generic hash-commit / salted-reveal primitive.
//!
//! One abstraction, four instantiations (deck, role, night action, mafia
//! target). A commitment binds a committer to a hidden value; the reveal is
//! single-shot and accepted only on an exact hash match.

pub mod payload;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::types::{CommitHash, Salt};

pub use payload::{commit_payload, hash_payload, CommitPayload};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommitError {
    #[error("a commitment already exists for this key")]
    AlreadyCommitted,
    #[error("no commitment exists for this key")]
    NotCommitted,
    #[error("commitment was already revealed")]
    AlreadyRevealed,
    #[error("reveal does not match the committed hash")]
    InvalidReveal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment<P> {
    hash: CommitHash,
    committed_at: DateTime<Utc>,
    revealed_at: Option<DateTime<Utc>>,
    revealed: Option<P>,
}

impl<P: CommitPayload + Clone> Commitment<P> {
    pub fn new(hash: CommitHash, now: DateTime<Utc>) -> Self {
        Self {
            hash,
            committed_at: now,
            revealed_at: None,
            revealed: None,
        }
    }

    pub fn hash(&self) -> CommitHash {
        self.hash
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed.is_some()
    }

    pub fn revealed(&self) -> Option<&P> {
        self.revealed.as_ref()
    }

    /// Consume the commitment with a payload + salt that must hash to the
    /// committed value. At most one reveal ever succeeds.
    pub fn reveal(&mut self, payload: P, salt: &Salt, now: DateTime<Utc>) -> Result<&P, CommitError> {
        if self.revealed.is_some() {
            return Err(CommitError::AlreadyRevealed);
        }
        if hash_payload(&payload, salt) != self.hash {
            return Err(CommitError::InvalidReveal);
        }
        self.revealed_at = Some(now);
        self.revealed = Some(payload);
        Ok(self.revealed.as_ref().expect("just stored"))
    }
}

#[cfg(test)]
mod tests {
    use super::payload::{MafiaTargetPayload, RolePayload};
    use super::*;
    use crate::shuffle::deck::Role;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn reveal_succeeds_exactly_once_on_match() {
        let mut rng = StdRng::seed_from_u64(41);
        let payload = RolePayload { role: Role::Doctor };
        let (hash, salt) = commit_payload(&payload, &mut rng);

        let mut commitment = Commitment::new(hash, now());
        assert!(!commitment.is_revealed());
        assert!(commitment.reveal(payload, &salt, now()).is_ok());
        assert_eq!(commitment.revealed(), Some(&payload));
        assert_eq!(
            commitment.reveal(payload, &salt, now()),
            Err(CommitError::AlreadyRevealed)
        );
    }

    #[test]
    fn reveal_rejects_wrong_payload() {
        let mut rng = StdRng::seed_from_u64(42);
        let (hash, salt) = commit_payload(&MafiaTargetPayload { target: 1 }, &mut rng);

        let mut commitment = Commitment::new(hash, now());
        assert_eq!(
            commitment.reveal(MafiaTargetPayload { target: 2 }, &salt, now()),
            Err(CommitError::InvalidReveal)
        );
        assert!(!commitment.is_revealed(), "failed reveal must not consume");
    }

    #[test]
    fn single_bit_salt_mutations_are_rejected() {
        let mut rng = StdRng::seed_from_u64(43);
        let payload = RolePayload { role: Role::Mafia };
        let (hash, salt) = commit_payload(&payload, &mut rng);

        for _ in 0..64 {
            let mut mutated = salt.clone();
            let byte = rng.gen_range(0..32);
            let bit = rng.gen_range(0..8);
            mutated.0[byte] ^= 1 << bit;

            let mut commitment = Commitment::new(hash, now());
            assert_eq!(
                commitment.reveal(payload, &mutated, now()),
                Err(CommitError::InvalidReveal)
            );
        }
    }
}
