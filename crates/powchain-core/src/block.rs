use crate::constants::{DIFFICULTY, GENESIS_DATA};
use crate::error::Result;
use crate::hash::block_hash;
use crate::pow::{Candidate, MineControl, ProofOfWork};
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// A mined block. `hash` is both its identity and its storage key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) hash: Hash,
    pub(crate) data: Vec<u8>,
    /// `None` only for genesis.
    pub(crate) prev_hash: Option<Hash>,
    pub(crate) nonce: u64,
}

impl Block {
    /// Mines a block on top of `prev_hash`. Blocks until a nonce is found or
    /// `ctl` stops the search, so this is not a cheap constructor.
    pub fn create(
        data: impl Into<Vec<u8>>,
        prev_hash: Option<Hash>,
        pow: &ProofOfWork,
        ctl: &MineControl,
    ) -> Result<Self> {
        let data = data.into();
        let candidate = Candidate {
            prev_hash: prev_hash.as_ref().map_or(&[][..], |h| &h[..]),
            data: &data,
        };
        let (nonce, hash) = pow.mine(&candidate, ctl)?;
        info!(
            "Mined block {} with nonce {} ({} bytes of data)",
            hex::encode(hash),
            nonce,
            data.len()
        );
        Ok(Self {
            hash,
            data,
            prev_hash,
            nonce,
        })
    }

    pub fn genesis(pow: &ProofOfWork, ctl: &MineControl) -> Result<Self> {
        Self::create(GENESIS_DATA, None, pow, ctl)
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn prev_hash(&self) -> Option<&Hash> {
        self.prev_hash.as_ref()
    }

    /// Previous hash as it enters the block hash: empty for genesis.
    pub fn prev_hash_bytes(&self) -> &[u8] {
        self.prev_hash.as_ref().map_or(&[][..], |h| &h[..])
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Hash recomputed from the stored fields, ignoring the stored `hash`.
    pub fn computed_hash(&self) -> Hash {
        block_hash(self.prev_hash_bytes(), &self.data, self.nonce, DIFFICULTY)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <- {} \"{}\"",
            hex::encode(self.prev_hash_bytes()),
            hex::encode(self.hash),
            String::from_utf8_lossy(&self.data)
        )
    }
}
