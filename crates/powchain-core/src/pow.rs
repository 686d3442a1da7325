//! Proof-of-work search and verification.
//!
//! A hash meets the target when, read as a 256-bit big-endian integer, it is
//! strictly below `1 << (256 - DIFFICULTY)`. The miner walks nonces upward
//! from zero and returns the first one that meets the target.

use crate::constants::{DIFFICULTY, HASH_BITS, HASH_SIZE, MAX_NONCE, PARALLEL_BATCH};
use crate::error::{ChainError, Result};
use crate::hash::{block_hash, PrefixHasher};
use crate::{Block, Hash};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 256-bit target stored big-endian, so byte-wise ordering is numeric ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target(Hash);

impl Target {
    /// `1 << (256 - difficulty)`, or `None` when that does not fit in 256 bits
    /// or would accept every hash.
    pub const fn from_difficulty(difficulty: u32) -> Option<Self> {
        if difficulty == 0 || difficulty >= HASH_BITS {
            return None;
        }
        let bit = HASH_BITS - difficulty;
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 1 - (bit / 8) as usize] = 1 << (bit % 8);
        Some(Target(bytes))
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }

    pub fn is_met_by(&self, hash: &Hash) -> bool {
        hash < &self.0
    }
}

const DEFAULT_TARGET: Target = match Target::from_difficulty(DIFFICULTY) {
    Some(target) => target,
    None => panic!("DIFFICULTY must be in 1..256"),
};

/// The fields a nonce is searched against.
#[derive(Clone, Copy, Debug)]
pub struct Candidate<'a> {
    pub prev_hash: &'a [u8],
    pub data: &'a [u8],
}

/// Shared stop signal for an in-flight mine.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bounds on a mine, checked before every nonce attempt.
#[derive(Clone, Debug, Default)]
pub struct MineControl {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl MineControl {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    fn check(&self, attempts: u64) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(ChainError::MiningCancelled { attempts });
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ChainError::MiningTimeout { attempts });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ProofOfWork {
    target: Target,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofOfWork {
    pub fn new() -> Self {
        Self {
            target: DEFAULT_TARGET,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Returns the first nonce (and its hash) meeting the target.
    pub fn mine(&self, candidate: &Candidate<'_>, ctl: &MineControl) -> Result<(u64, Hash)> {
        let hasher = PrefixHasher::new(candidate.prev_hash, candidate.data, DIFFICULTY);
        let mut nonce = 0u64;
        while nonce < MAX_NONCE {
            ctl.check(nonce)?;
            let hash = hasher.hash_nonce(nonce);
            trace!(nonce, hash = %hex::encode(hash), "pow attempt");
            if self.target.is_met_by(&hash) {
                debug!(nonce, "pow solved");
                return Ok((nonce, hash));
            }
            nonce += 1;
        }
        Err(ChainError::NonceSpaceExhausted)
    }

    /// Same result as [`ProofOfWork::mine`], searched across the rayon pool.
    /// Batches are scanned in order with `find_first`, so the smallest
    /// winning nonce still wins. The control is checked between batches.
    pub fn mine_parallel(
        &self,
        candidate: &Candidate<'_>,
        ctl: &MineControl,
    ) -> Result<(u64, Hash)> {
        let hasher = PrefixHasher::new(candidate.prev_hash, candidate.data, DIFFICULTY);
        let mut start = 0u64;
        while start < MAX_NONCE {
            ctl.check(start)?;
            let end = start.saturating_add(PARALLEL_BATCH).min(MAX_NONCE);
            let found = (start..end)
                .into_par_iter()
                .find_first(|nonce| self.target.is_met_by(&hasher.hash_nonce(*nonce)));
            if let Some(nonce) = found {
                debug!(nonce, "pow solved in parallel");
                return Ok((nonce, hasher.hash_nonce(nonce)));
            }
            start = end;
        }
        Err(ChainError::NonceSpaceExhausted)
    }

    /// Recomputes the hash from the block's stored nonce and fields and
    /// checks it against the target. Does not mine.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = block_hash(block.prev_hash_bytes(), block.data(), block.nonce(), DIFFICULTY);
        self.target.is_met_by(&hash)
    }
}
