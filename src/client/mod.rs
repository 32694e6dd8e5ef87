//! Player-side protocol driver.
//!
//! Owns the secrets a participant never puts on the ledger: the SRA key
//! pair, and the salts of not-yet-revealed commitments. The ledger state is
//! always authoritative; nothing here advances a local phase assumption
//! before the corresponding ledger call is accepted.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use rand::Rng;
use thiserror::Error;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::commitment::payload::{commit_payload, RolePayload};
use crate::crypto::{decrypt_with_key, ArithmeticError, SraKeyPair, SraParams};
use crate::ledger::types::{CommitHash, PlayerId, Salt};
use crate::shuffle::deck::{generate_initial_deck, Deck, Role};
use crate::shuffle::engine::prepare_shuffle;

const LOG_TARGET: &str = "mental_mafia::client";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
    /// Decrypting with a partial key set yields silent garbage, never an
    /// error from the math, so the gate lives here.
    #[error("collected {have} decryption keys, need {need}")]
    IncompleteKeySet { have: usize, need: usize },
    #[error("no shuffle turn is pending")]
    NoPendingShuffle,
    #[error("no role commitment is pending")]
    NoPendingRole,
    #[error("shuffle keys have not been generated for this room")]
    KeysNotGenerated,
    #[error("received decryption-key blob is malformed")]
    MalformedKeyBlob,
    #[error("card index is outside the deck")]
    CardIndexOutOfRange,
    #[error("decrypted card does not map to a role")]
    UnmappableCard,
}

/// A completed shuffle pass awaiting its reveal; the salt stays secret
/// until then and is scrubbed if the turn is abandoned.
struct PendingShuffle {
    deck: Deck,
    salt: Salt,
}

impl Drop for PendingShuffle {
    fn drop(&mut self) {
        self.salt.zeroize();
    }
}

struct PendingRole {
    role: Role,
    salt: Salt,
}

impl Drop for PendingRole {
    fn drop(&mut self) {
        self.salt.zeroize();
    }
}

pub struct PlayerClient {
    player_id: PlayerId,
    params: SraParams,
    keys: Option<SraKeyPair>,
    pending_shuffle: Option<PendingShuffle>,
    pending_role: Option<PendingRole>,
    collected_keys: BTreeMap<PlayerId, BigUint>,
}

impl PlayerClient {
    pub fn new(player_id: PlayerId, params: SraParams) -> Self {
        Self {
            player_id,
            params,
            keys: None,
            pending_shuffle: None,
            pending_role: None,
            collected_keys: BTreeMap::new(),
        }
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    // ---- shuffle turn -----------------------------------------------------

    /// Run this player's full shuffle pass. The first shuffler passes `None`
    /// and starts from a fresh plaintext deck; later shufflers pass the
    /// previously revealed deck. Returns the hash to commit; the deck and
    /// salt stay local until [`Self::shuffle_reveal`].
    pub fn begin_shuffle_turn<R: Rng + ?Sized>(
        &mut self,
        input_deck: Option<&Deck>,
        player_count: usize,
        rng: &mut R,
    ) -> Result<CommitHash, ClientError> {
        let keys = SraKeyPair::generate(&self.params, rng)?;
        let starting_deck;
        let input = match input_deck {
            Some(deck) => deck,
            None => {
                starting_deck = generate_initial_deck(player_count);
                &starting_deck
            }
        };

        let prepared = prepare_shuffle(input, &keys, &self.params, rng);
        debug!(
            target: LOG_TARGET,
            player = self.player_id,
            hash = %prepared.hash,
            "shuffle pass prepared"
        );
        self.keys = Some(keys);
        let hash = prepared.hash;
        self.pending_shuffle = Some(PendingShuffle {
            deck: prepared.deck,
            salt: prepared.salt,
        });
        Ok(hash)
    }

    /// The (deck, salt) pair for the reveal that must follow the commit.
    pub fn shuffle_reveal(&mut self) -> Result<(Deck, Salt), ClientError> {
        let pending = self
            .pending_shuffle
            .take()
            .ok_or(ClientError::NoPendingShuffle)?;
        Ok((pending.deck.clone(), pending.salt.clone()))
    }

    // ---- role commitment --------------------------------------------------

    /// Bind the decrypted role into a commitment; the salt is retained for
    /// the confirmation-time commit and the endgame reveal.
    pub fn prepare_role_commit<R: Rng + ?Sized>(
        &mut self,
        role: Role,
        rng: &mut R,
    ) -> CommitHash {
        let (hash, salt) = commit_payload(&RolePayload { role }, rng);
        self.pending_role = Some(PendingRole { role, salt });
        hash
    }

    pub fn role_reveal(&self) -> Result<(Role, Salt), ClientError> {
        let pending = self.pending_role.as_ref().ok_or(ClientError::NoPendingRole)?;
        Ok((pending.role, pending.salt.clone()))
    }

    // ---- key exchange -----------------------------------------------------

    /// Encode this player's decryption key for disclosure. Wrapping the blob
    /// to each recipient's wallet key is the session layer's job; the ledger
    /// treats it as opaque either way.
    pub fn export_decryption_key(&self) -> Result<String, ClientError> {
        let keys = self.keys.as_ref().ok_or(ClientError::KeysNotGenerated)?;
        let bytes = Zeroizing::new(keys.decryption_key.to_bytes_be());
        Ok(hex::encode(&*bytes))
    }

    pub fn export_keys_for<I>(&self, recipients: I) -> Result<BTreeMap<PlayerId, String>, ClientError>
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let blob = self.export_decryption_key()?;
        Ok(recipients.into_iter().map(|id| (id, blob.clone())).collect())
    }

    pub fn import_decryption_key(
        &mut self,
        from: PlayerId,
        blob: &str,
    ) -> Result<(), ClientError> {
        let bytes = hex::decode(blob).map_err(|_| ClientError::MalformedKeyBlob)?;
        self.collected_keys
            .insert(from, BigUint::from_bytes_be(&bytes));
        Ok(())
    }

    pub fn collected_key_count(&self) -> usize {
        self.collected_keys.len()
    }

    // ---- decryption aggregation -------------------------------------------

    /// Recover this player's own role from the fully shuffled deck. Applies
    /// the player's own key plus every collected foreign key; order is
    /// irrelevant by commutativity. `expected_foreign_keys` must be the
    /// count of other currently-active players, checked before any math.
    pub fn decrypt_own_card(
        &self,
        deck: &Deck,
        my_index: usize,
        expected_foreign_keys: usize,
    ) -> Result<Role, ClientError> {
        if self.collected_keys.len() < expected_foreign_keys {
            return Err(ClientError::IncompleteKeySet {
                have: self.collected_keys.len(),
                need: expected_foreign_keys,
            });
        }
        let keys = self.keys.as_ref().ok_or(ClientError::KeysNotGenerated)?;
        let card = deck.get(my_index).ok_or(ClientError::CardIndexOutOfRange)?;

        let mut value = decrypt_with_key(card, &keys.decryption_key, &self.params);
        for foreign in self.collected_keys.values() {
            value = decrypt_with_key(&value, foreign, &self.params);
        }
        Role::from_card_value(&value).ok_or(ClientError::UnmappableCard)
    }
}
