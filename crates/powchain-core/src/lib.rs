//! Hash-linked, proof-of-work gated chain of blocks.

pub mod block;
pub mod chain;
pub mod codec;
pub mod constants;
pub mod error;
pub mod hash;
pub mod pow;

pub type Hash = [u8; 32];

pub use block::Block;
pub use chain::{Blockchain, BlockchainIterator, ChainStore};
pub use error::{ChainError, EncodingError, Result};
pub use pow::{CancelToken, MineControl, ProofOfWork};
