//! SRA-style commutative cipher.
//!
//! Encryption is modular exponentiation under a shared prime modulus:
//! exponents applied to the same base commute, so N players can each layer
//! their own key over a card and the layers peel off in any order. That
//! commutativity is the load-bearing property of the whole shuffle and is
//! tested explicitly below.

use num_bigint::BigUint;
use num_traits::One;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::arith::{generate_coprime, mod_inverse, mod_pow, ArithmeticError};

/// Prime-group parameters the cipher operates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SraParams {
    modulus: BigUint,
}

impl SraParams {
    pub fn new(modulus: BigUint) -> Self {
        Self { modulus }
    }

    /// The original protocol's group: the Mersenne prime 2^31 - 1. Discrete
    /// log is feasible at this size; kept only so the original parameters
    /// stay testable. Use [`crate::config::default_sra_params`] otherwise.
    pub fn toy() -> Self {
        Self {
            modulus: BigUint::from(2_147_483_647u32),
        }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Order of the multiplicative group, p - 1. Exponents live mod this.
    pub fn group_order(&self) -> BigUint {
        &self.modulus - BigUint::one()
    }

    pub fn contains(&self, value: &BigUint) -> bool {
        value < &self.modulus
    }
}

/// Per-player, per-room ephemeral key pair with e*d = 1 (mod p-1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SraKeyPair {
    pub encryption_key: BigUint,
    pub decryption_key: BigUint,
}

impl SraKeyPair {
    /// Draw e coprime with the group order and derive d = e^-1 mod (p-1).
    /// `NoInverse` here would mean the coprimality search is broken.
    pub fn generate<R: Rng + ?Sized>(
        params: &SraParams,
        rng: &mut R,
    ) -> Result<Self, ArithmeticError> {
        let order = params.group_order();
        let e = generate_coprime(&order, rng);
        let d = mod_inverse(&e, &order)?;
        Ok(Self {
            encryption_key: e,
            decryption_key: d,
        })
    }
}

pub fn encrypt(value: &BigUint, key: &SraKeyPair, params: &SraParams) -> BigUint {
    mod_pow(value, &key.encryption_key, params.modulus())
}

pub fn decrypt(value: &BigUint, key: &SraKeyPair, params: &SraParams) -> BigUint {
    mod_pow(value, &key.decryption_key, params.modulus())
}

/// Peel one layer with a decryption key disclosed by another player. Applying
/// the wrong key does not fail, it silently yields garbage; callers gate on
/// having collected every required key before trusting the result.
pub fn decrypt_with_key(value: &BigUint, decryption_key: &BigUint, params: &SraParams) -> BigUint {
    mod_pow(value, decryption_key, params.modulus())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_sra_params;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn keys(params: &SraParams, seed: u64) -> SraKeyPair {
        let mut rng = StdRng::seed_from_u64(seed);
        SraKeyPair::generate(params, &mut rng).unwrap()
    }

    #[test]
    fn key_pair_is_inverse_under_group_order() {
        let params = SraParams::toy();
        let key = keys(&params, 1);
        let product = (&key.encryption_key * &key.decryption_key) % params.group_order();
        assert!(product.is_one());
    }

    #[test]
    fn encrypt_decrypt_round_trips() {
        let params = SraParams::toy();
        let key = keys(&params, 2);
        for v in [2u32, 3, 4, 5, 1_000_003] {
            let v = BigUint::from(v);
            assert_eq!(decrypt(&encrypt(&v, &key, &params), &key, &params), v);
        }
    }

    #[test]
    fn two_layers_commute_in_both_decryption_orders() {
        let params = SraParams::toy();
        let k1 = keys(&params, 3);
        let k2 = keys(&params, 4);
        let v = BigUint::from(48_271u32);

        let layered = encrypt(&encrypt(&v, &k1, &params), &k2, &params);

        let via_k1_first = decrypt_with_key(
            &decrypt_with_key(&layered, &k1.decryption_key, &params),
            &k2.decryption_key,
            &params,
        );
        let via_k2_first = decrypt_with_key(
            &decrypt_with_key(&layered, &k2.decryption_key, &params),
            &k1.decryption_key,
            &params,
        );

        assert_eq!(via_k1_first, v);
        assert_eq!(via_k2_first, v);
    }

    #[test]
    fn commutativity_holds_in_the_default_group() {
        let params = default_sra_params().clone();
        let k1 = keys(&params, 5);
        let k2 = keys(&params, 6);
        let v = BigUint::from(5u8);

        let layered = encrypt(&encrypt(&v, &k1, &params), &k2, &params);
        let peeled = decrypt_with_key(
            &decrypt_with_key(&layered, &k2.decryption_key, &params),
            &k1.decryption_key,
            &params,
        );
        assert_eq!(peeled, v);
    }

    #[test]
    fn foreign_key_application_order_is_irrelevant_for_three_layers() {
        let params = SraParams::toy();
        let ks = [keys(&params, 7), keys(&params, 8), keys(&params, 9)];
        let v = BigUint::from(7_919u32);

        let mut layered = v.clone();
        for k in &ks {
            layered = encrypt(&layered, k, &params);
        }

        for order in [[0, 1, 2], [2, 0, 1], [1, 2, 0]] {
            let mut peeled = layered.clone();
            for i in order {
                peeled = decrypt_with_key(&peeled, &ks[i].decryption_key, &params);
            }
            assert_eq!(peeled, v, "order {order:?} failed to unwind the layers");
        }
    }
}
