use rand::Rng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub type RoomId = uuid::Uuid;
pub type PlayerId = u64;

/// Sequence number of an event in the room's append-only log.
pub type EventSeq = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitHash([u8; 32]);

impl CommitHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl Default for CommitHash {
    fn default() -> Self {
        Self::zero()
    }
}

impl AsRef<[u8; 32]> for CommitHash {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for CommitHash {
    fn from(bytes: [u8; 32]) -> Self {
        CommitHash::new(bytes)
    }
}

impl From<CommitHash> for [u8; 32] {
    fn from(hash: CommitHash) -> Self {
        hash.0
    }
}

impl std::fmt::Display for CommitHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Blinding salt bound into every commitment. Secret until the reveal,
/// so holders zeroize it when a pending commitment is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for Salt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn commit_hash_round_trips_with_serde() {
        assert_round_trip_eq(&CommitHash::new([7u8; 32]));
    }

    #[test]
    fn commit_hash_displays_as_hex() {
        let hash = CommitHash::new([0xab; 32]);
        assert_eq!(hash.to_string(), "ab".repeat(32));
    }

    #[test]
    fn salt_round_trips_with_serde() {
        assert_round_trip_eq(&Salt([3u8; 32]));
    }
}
