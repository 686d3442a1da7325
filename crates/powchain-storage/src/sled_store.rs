use powchain_core::codec::{decode_block, encode_block};
use powchain_core::constants::LATEST_HASH_KEY;
use powchain_core::{Block, ChainError, ChainStore, EncodingError, Hash, Result};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use sled::{Db, IVec};
use std::path::Path;
use tracing::{debug, info};

/// `ChainStore` over sled's default tree. Keys are raw block hashes plus
/// the reserved `"lh"` pointer.
///
/// sled holds an exclusive lock on the directory, so a second process
/// opening the same path fails with [`ChainError::StoreUnavailable`].
#[derive(Clone)]
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        // Every write flushes itself; without the background flusher the
        // directory lock is released as soon as the last handle drops.
        let db = sled::Config::new()
            .path(path)
            .flush_every_ms(None)
            .open()
            .map_err(|e| ChainError::StoreUnavailable {
                path: path.to_path_buf(),
                source: Box::new(e),
            })?;
        info!("sled store opened at {}", path.display());
        Ok(Self { db })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush().map_err(ChainError::store)?;
        Ok(())
    }
}

fn tx_error(err: TransactionError<ChainError>) -> ChainError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => ChainError::store(e),
    }
}

fn abort<T>(err: ChainError) -> ConflictableTransactionResult<T, ChainError> {
    Err(ConflictableTransactionError::Abort(err))
}

fn pointer_hash(value: &[u8]) -> Result<Hash> {
    if value.len() != 32 {
        return Err(EncodingError::BadPointer(value.len()).into());
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(value);
    Ok(arr)
}

impl ChainStore for SledStore {
    fn put_genesis_if_absent(&self, genesis: &Block) -> Result<Hash> {
        let hash = genesis.hash();
        let bytes = encode_block(genesis)?;
        let tip = self
            .db
            .transaction(|tx| -> ConflictableTransactionResult<IVec, ChainError> {
                if let Some(existing) = tx.get(LATEST_HASH_KEY)? {
                    return Ok(existing);
                }
                tx.insert(&hash[..], bytes.as_slice())?;
                tx.insert(LATEST_HASH_KEY, &hash[..])?;
                Ok(IVec::from(&hash[..]))
            })
            .map_err(tx_error)?;
        self.flush()?;
        let tip = pointer_hash(&tip)?;
        if tip == hash {
            info!("genesis block {} stored", hex::encode(hash));
        }
        Ok(tip)
    }

    fn append(&self, block: &Block) -> Result<()> {
        let hash = block.hash();
        let prev = block.prev_hash().copied();
        let bytes = encode_block(block)?;
        self.db
            .transaction(|tx| -> ConflictableTransactionResult<(), ChainError> {
                let tip = match tx.get(LATEST_HASH_KEY)? {
                    Some(value) => match pointer_hash(&value) {
                        Ok(tip) => Some(tip),
                        Err(e) => return abort(e),
                    },
                    None => None,
                };
                if tip != prev {
                    return abort(ChainError::StaleTip {
                        expected: prev.map(hex::encode).unwrap_or_default(),
                        found: tip.map(hex::encode).unwrap_or_default(),
                    });
                }
                tx.insert(&hash[..], bytes.as_slice())?;
                tx.insert(LATEST_HASH_KEY, &hash[..])?;
                Ok(())
            })
            .map_err(tx_error)?;
        self.flush()?;
        debug!(hash = %hex::encode(hash), bytes = bytes.len(), "block appended");
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Block> {
        let bytes = self
            .db
            .get(hash)
            .map_err(ChainError::store)?
            .ok_or_else(|| ChainError::NotFound(hex::encode(hash)))?;
        let block = decode_block(&bytes)?;
        if block.hash() != *hash {
            return Err(EncodingError::KeyMismatch {
                key: hex::encode(hash),
                found: hex::encode(block.hash()),
            }
            .into());
        }
        Ok(block)
    }

    fn latest_hash(&self) -> Result<Option<Hash>> {
        self.db
            .get(LATEST_HASH_KEY)
            .map_err(ChainError::store)?
            .map(|v| pointer_hash(&v))
            .transpose()
    }

    fn set_latest_hash(&self, hash: &Hash) -> Result<()> {
        self.db
            .transaction(|tx| -> ConflictableTransactionResult<(), ChainError> {
                if tx.get(&hash[..])?.is_none() {
                    return abort(ChainError::NotFound(hex::encode(hash)));
                }
                tx.insert(LATEST_HASH_KEY, &hash[..])?;
                Ok(())
            })
            .map_err(tx_error)?;
        self.flush()?;
        debug!(hash = %hex::encode(hash), "latest hash moved");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.flush()
    }
}
