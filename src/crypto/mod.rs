pub mod arith;
pub mod sra;

pub use arith::{gcd, generate_coprime, mod_inverse, mod_pow, ArithmeticError};
pub use sra::{decrypt, decrypt_with_key, encrypt, SraKeyPair, SraParams};
