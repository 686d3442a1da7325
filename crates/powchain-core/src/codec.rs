//! Binary block encoding for the store.
//!
//! bincode with fixed-width integers, a size cap and no trailing bytes.
//! Both directions re-derive the hash from the block's fields and check it
//! against the target, so a flipped byte or an unmined block is reported
//! instead of being written or returned.

use crate::constants::MAX_BLOCK_BYTES;
use crate::error::{EncodingError, Result};
use crate::pow::ProofOfWork;
use crate::Block;
use bincode::Options;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_BLOCK_BYTES)
        .reject_trailing_bytes()
}

/// Hash must match the content and meet the target.
fn verify(block: &Block) -> Result<()> {
    let computed = block.computed_hash();
    if computed != block.hash {
        return Err(EncodingError::HashMismatch {
            stored: hex::encode(block.hash),
            computed: hex::encode(computed),
        }
        .into());
    }
    if !ProofOfWork::new().target().is_met_by(&block.hash) {
        return Err(EncodingError::InsufficientWork {
            hash: hex::encode(block.hash),
        }
        .into());
    }
    Ok(())
}

pub fn encode_block(block: &Block) -> Result<Vec<u8>> {
    verify(block)?;
    Ok(options()
        .serialize(block)
        .map_err(EncodingError::from)?)
}

pub fn decode_block(bytes: &[u8]) -> Result<Block> {
    let block: Block = options()
        .deserialize(bytes)
        .map_err(EncodingError::from)?;
    verify(&block)?;
    Ok(block)
}
