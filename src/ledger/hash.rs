//! Canonical transcript encoding for commitment hashing.
//!
//! Every committed payload is serialized through [`TranscriptBuilder`] with a
//! schema domain tag and length-prefixed fields, then hashed with SHA-256.
//! The encoding is fixed for the life of a room: two payloads of different
//! logical shape can never collide on the same byte stream.

use sha2::{Digest, Sha256};

use super::types::{CommitHash, Salt};

const DOMAIN_TAG: &[u8] = b"mafia/commit/v1";

/// Builder for canonical commitment transcripts.
pub struct TranscriptBuilder {
    buffer: Vec<u8>,
}

impl TranscriptBuilder {
    pub fn new(schema: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(128);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(schema.len() as u16).to_be_bytes());
        buffer.extend_from_slice(schema.as_bytes());
        Self { buffer }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn append_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn append_option_u64(&mut self, value: Option<u64>) {
        match value {
            Some(v) => {
                self.buffer.push(1);
                self.append_u64(v);
            }
            None => self.buffer.push(0),
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }

    /// Bind the salt and digest the transcript into a commitment hash.
    pub fn finalize_with_salt(mut self, salt: &Salt) -> CommitHash {
        self.append_bytes(salt.as_bytes());
        let digest = Sha256::digest(&self.buffer);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        CommitHash::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcripts_are_domain_separated_by_schema() {
        let salt = Salt([1u8; 32]);

        let mut a = TranscriptBuilder::new("schema/a");
        a.append_u64(42);
        let mut b = TranscriptBuilder::new("schema/b");
        b.append_u64(42);

        assert_ne!(
            a.finalize_with_salt(&salt),
            b.finalize_with_salt(&salt),
            "identical fields under different schemas must not collide"
        );
    }

    #[test]
    fn length_prefixing_disambiguates_adjacent_byte_fields() {
        let salt = Salt([0u8; 32]);

        let mut a = TranscriptBuilder::new("schema/bytes");
        a.append_bytes(b"ab");
        a.append_bytes(b"c");

        let mut b = TranscriptBuilder::new("schema/bytes");
        b.append_bytes(b"a");
        b.append_bytes(b"bc");

        assert_ne!(a.finalize_with_salt(&salt), b.finalize_with_salt(&salt));
    }

    #[test]
    fn same_transcript_and_salt_hash_identically() {
        let build = || {
            let mut t = TranscriptBuilder::new("schema/stable");
            t.append_u8(3);
            t.append_option_u64(Some(9));
            t
        };
        let salt = Salt([9u8; 32]);
        assert_eq!(
            build().finalize_with_salt(&salt),
            build().finalize_with_salt(&salt)
        );
    }

    #[test]
    fn salt_is_bound_into_the_hash() {
        let build = || TranscriptBuilder::new("schema/salted");
        assert_ne!(
            build().finalize_with_salt(&Salt([0u8; 32])),
            build().finalize_with_salt(&Salt([1u8; 32]))
        );
    }
}
