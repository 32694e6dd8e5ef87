//! One player's shuffle pass: uniform permutation plus an encryption layer.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::commitment::payload::DeckPayload;
use crate::commitment::commit_payload;
use crate::crypto::{encrypt, SraKeyPair, SraParams};
use crate::ledger::types::{CommitHash, Salt};

use super::deck::Deck;

const LOG_TARGET: &str = "mental_mafia::shuffle";

/// Fisher-Yates the whole deck, then layer this player's encryption key
/// over every slot. The permutation stays secret to the shuffler.
pub fn shuffle_and_encrypt<R: Rng + ?Sized>(
    deck: &Deck,
    key: &SraKeyPair,
    params: &SraParams,
    rng: &mut R,
) -> Deck {
    let mut shuffled: Deck = deck.to_vec();
    shuffled.shuffle(rng);
    let encrypted: Deck = shuffled
        .iter()
        .map(|card| encrypt(card, key, params))
        .collect();
    debug!(target: LOG_TARGET, slots = encrypted.len(), "shuffle pass applied");
    encrypted
}

/// A completed pass bundled for commit-then-reveal submission. The hash is
/// committed to the ledger strictly before the deck and salt are revealed,
/// so a shuffler cannot re-permute after seeing anyone react.
#[derive(Debug, Clone)]
pub struct PreparedShuffle {
    pub deck: Deck,
    pub salt: Salt,
    pub hash: CommitHash,
}

pub fn prepare_shuffle<R: Rng + ?Sized>(
    input_deck: &Deck,
    key: &SraKeyPair,
    params: &SraParams,
    rng: &mut R,
) -> PreparedShuffle {
    let deck = shuffle_and_encrypt(input_deck, key, params, rng);
    let (hash, salt) = commit_payload(&DeckPayload { deck: deck.clone() }, rng);
    PreparedShuffle { deck, salt, hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::payload::hash_payload;
    use crate::shuffle::deck::{generate_initial_deck, Role};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pass_preserves_the_role_multiset_under_own_key() {
        let params = SraParams::toy();
        let mut rng = StdRng::seed_from_u64(21);
        let key = SraKeyPair::generate(&params, &mut rng).unwrap();

        let deck = generate_initial_deck(6);
        let out = shuffle_and_encrypt(&deck, &key, &params, &mut rng);
        assert_eq!(out.len(), deck.len());

        let mut recovered: Vec<Role> = out
            .iter()
            .map(|c| {
                let plain = crate::crypto::decrypt(c, &key, &params);
                Role::from_card_value(&plain).expect("decrypted card maps to a role")
            })
            .collect();
        let mut expected: Vec<Role> = deck
            .iter()
            .map(|c| Role::from_card_value(c).unwrap())
            .collect();
        recovered.sort_by_key(|r| r.as_byte());
        expected.sort_by_key(|r| r.as_byte());
        assert_eq!(recovered, expected);
    }

    #[test]
    fn prepared_shuffle_hash_matches_its_reveal() {
        let params = SraParams::toy();
        let mut rng = StdRng::seed_from_u64(22);
        let key = SraKeyPair::generate(&params, &mut rng).unwrap();

        let prepared = prepare_shuffle(&generate_initial_deck(5), &key, &params, &mut rng);
        let recomputed = hash_payload(
            &DeckPayload {
                deck: prepared.deck.clone(),
            },
            &prepared.salt,
        );
        assert_eq!(recomputed, prepared.hash);
    }
}
