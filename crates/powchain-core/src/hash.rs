//! Block identity hashing.
//!
//! A block hash is `SHA256(prev_hash ‖ data ‖ be64(nonce) ‖ be64(difficulty))`.
//! Both integers are fixed-width big-endian so the digest is reproducible
//! bit-for-bit by any implementation.

use crate::Hash;
use sha2::{Digest, Sha256};

pub fn block_hash(prev_hash: &[u8], data: &[u8], nonce: u64, difficulty: u32) -> Hash {
    PrefixHasher::new(prev_hash, data, difficulty).hash_nonce(nonce)
}

/// SHA-256 state with `prev_hash ‖ data` already absorbed, so the miner
/// only hashes the 16 trailing bytes per attempt.
#[derive(Clone)]
pub struct PrefixHasher {
    state: Sha256,
    difficulty: [u8; 8],
}

impl PrefixHasher {
    pub fn new(prev_hash: &[u8], data: &[u8], difficulty: u32) -> Self {
        let mut state = Sha256::new();
        state.update(prev_hash);
        state.update(data);
        Self {
            state,
            difficulty: u64::from(difficulty).to_be_bytes(),
        }
    }

    pub fn hash_nonce(&self, nonce: u64) -> Hash {
        let mut hasher = self.state.clone();
        hasher.update(nonce.to_be_bytes());
        hasher.update(self.difficulty);
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }
}
