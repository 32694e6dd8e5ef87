//! Protocol parameters: the SRA group and per-room timing/bounds.

use chrono::Duration;
use once_cell::sync::Lazy;
use num_bigint::BigUint;
use num_traits::Num;
use serde::{Deserialize, Serialize};

use crate::crypto::SraParams;

/// RFC 3526 group 14: a 2048-bit safe prime. The original protocol ran over
/// 2^31 - 1, which is brute-forceable; the group is a parameter, so the
/// reimplementation scales it to a size where discrete log is intractable.
/// `SraParams::toy()` keeps the original group available for tests.
const RFC3526_GROUP14_HEX: &str = "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74\
020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437\
4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05\
98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB\
9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF";

static DEFAULT_SRA_PARAMS: Lazy<SraParams> = Lazy::new(|| {
    let modulus = BigUint::from_str_radix(RFC3526_GROUP14_HEX, 16)
        .expect("RFC 3526 modulus constant parses");
    SraParams::new(modulus)
});

pub fn default_sra_params() -> &'static SraParams {
    &DEFAULT_SRA_PARAMS
}

/// Per-room protocol configuration, fixed at room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub min_players: usize,
    pub max_players: usize,
    /// Seconds a shuffler has to complete their commit + reveal turn.
    pub turn_timeout_secs: i64,
    /// Seconds before any other phase may be force-advanced.
    pub phase_timeout_secs: i64,
    /// Base grace delay before anyone may open voting.
    pub vote_trigger_base_secs: i64,
    /// Additional per-rank delay in the voting-trigger waterfall.
    pub vote_trigger_step_secs: i64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 12,
            turn_timeout_secs: 120,
            phase_timeout_secs: 300,
            vote_trigger_base_secs: 60,
            vote_trigger_step_secs: 10,
        }
    }
}

impl RoomConfig {
    pub fn turn_timeout(&self) -> Duration {
        Duration::seconds(self.turn_timeout_secs)
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::seconds(self.phase_timeout_secs)
    }

    pub fn vote_trigger_base(&self) -> Duration {
        Duration::seconds(self.vote_trigger_base_secs)
    }

    pub fn vote_trigger_step(&self) -> Duration {
        Duration::seconds(self.vote_trigger_step_secs)
    }
}
