//! Modular arithmetic over the SRA group.

use num_bigint::{BigInt, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArithmeticError {
    /// gcd(a, m) != 1, so a has no inverse mod m. Surfacing this outside of
    /// key generation indicates a bug, not a recoverable condition.
    #[error("no modular inverse exists for the given operands")]
    NoInverse,
}

/// Modular exponentiation. Exponent zero yields one for any base.
pub fn mod_pow(base: &BigUint, exponent: &BigUint, modulus: &BigUint) -> BigUint {
    base.modpow(exponent, modulus)
}

pub fn gcd(a: &BigUint, b: &BigUint) -> BigUint {
    a.gcd(b)
}

/// Extended-Euclid modular inverse: the x with a*x = 1 (mod m).
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, ArithmeticError> {
    let a = BigInt::from(a.clone());
    let m = BigInt::from(m.clone());

    let mut r_prev = m.clone();
    let mut r = a;
    let mut t_prev = BigInt::zero();
    let mut t = BigInt::one();

    while !r.is_zero() {
        let q = &r_prev / &r;
        let r_next = &r_prev - &q * &r;
        r_prev = std::mem::replace(&mut r, r_next);
        let t_next = &t_prev - &q * &t;
        t_prev = std::mem::replace(&mut t, t_next);
    }

    if !r_prev.is_one() {
        return Err(ArithmeticError::NoInverse);
    }
    let inverse = if t_prev.is_negative() {
        t_prev + &m
    } else {
        t_prev
    };
    Ok(inverse
        .to_biguint()
        .expect("inverse normalized into [0, m)"))
}

/// Rejection-sample a value in [2, n) coprime with n. Uniform over the full
/// range so the key space does not degenerate; expected O(1) draws since
/// coprime values are dense for the group orders in use.
pub fn generate_coprime<R: Rng + ?Sized>(n: &BigUint, rng: &mut R) -> BigUint {
    let two = BigUint::from(2u8);
    loop {
        let candidate = rng.gen_biguint_range(&two, n);
        if gcd(&candidate, n).is_one() {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn big(v: u64) -> BigUint {
        BigUint::from(v)
    }

    #[test]
    fn mod_pow_handles_zero_exponent() {
        assert_eq!(mod_pow(&big(12345), &big(0), &big(97)), big(1));
    }

    #[test]
    fn mod_pow_matches_small_cases() {
        assert_eq!(mod_pow(&big(4), &big(13), &big(497)), big(445));
        assert_eq!(mod_pow(&big(2), &big(10), &big(1000)), big(24));
    }

    #[test]
    fn gcd_matches_euclid() {
        assert_eq!(gcd(&big(270), &big(192)), big(6));
        assert_eq!(gcd(&big(17), &big(31)), big(1));
    }

    #[test]
    fn mod_inverse_round_trips() {
        let m = big(2147483646);
        let a = big(65537);
        let inv = mod_inverse(&a, &m).unwrap();
        assert_eq!((a * inv) % m, big(1));
    }

    #[test]
    fn mod_inverse_rejects_non_coprime_operands() {
        assert_eq!(mod_inverse(&big(6), &big(9)), Err(ArithmeticError::NoInverse));
    }

    #[test]
    fn generated_coprimes_are_coprime() {
        let mut rng = StdRng::seed_from_u64(11);
        let n = big(2147483646);
        for _ in 0..32 {
            let c = generate_coprime(&n, &mut rng);
            assert!(c >= big(2) && c < n);
            assert!(gcd(&c, &n).is_one());
        }
    }
}
