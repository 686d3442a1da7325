use crate::error::{ChainError, Result};
use crate::pow::{MineControl, ProofOfWork};
use crate::{Block, Hash};
use std::sync::Arc;
use tracing::info;

/// Trait the storage backends implement for the chain to operate.
/// This lives in core so storage can depend on core without a cycle.
///
/// Every method is one transaction against the backing store.
pub trait ChainStore: Send + Sync {
    /// Stores `genesis` and points the tip at it unless a tip already
    /// exists. Check and write happen atomically. Returns the tip in
    /// effect afterwards.
    fn put_genesis_if_absent(&self, genesis: &Block) -> Result<Hash>;

    /// Stores `block` and moves the tip to it, both or neither. Fails with
    /// [`ChainError::StaleTip`] if `block` does not link to the current tip.
    fn append(&self, block: &Block) -> Result<()>;

    /// Fails with [`ChainError::NotFound`] when nothing is stored at `hash`.
    fn get(&self, hash: &Hash) -> Result<Block>;

    fn latest_hash(&self) -> Result<Option<Hash>>;

    /// Moves the tip to an already stored block.
    fn set_latest_hash(&self, hash: &Hash) -> Result<()>;

    fn has_chain(&self) -> Result<bool> {
        Ok(self.latest_hash()?.is_some())
    }

    fn close(&self) -> Result<()>;
}

/// Single-writer handle on a persisted chain.
///
/// `add_block` takes `&mut self`; callers sharing one handle across threads
/// wrap it in a mutex.
pub struct Blockchain<S: ChainStore> {
    store: Arc<S>,
    pow: ProofOfWork,
    last_hash: Hash,
}

impl<S: ChainStore> Blockchain<S> {
    /// Resumes the chain in `store`, bootstrapping a genesis block if the
    /// store holds none. This is the only place genesis is created.
    pub fn init(store: Arc<S>) -> Result<Self> {
        Self::init_with(store, &MineControl::unbounded())
    }

    pub fn init_with(store: Arc<S>, ctl: &MineControl) -> Result<Self> {
        let pow = ProofOfWork::new();
        let last_hash = match store.latest_hash()? {
            Some(hash) => {
                info!("resuming chain at {}", hex::encode(hash));
                hash
            }
            None => {
                info!("no existing blockchain found, mining genesis");
                let genesis = Block::genesis(&pow, ctl)?;
                let tip = store.put_genesis_if_absent(&genesis)?;
                if tip != genesis.hash() {
                    info!("store was bootstrapped concurrently, using its tip");
                }
                tip
            }
        };
        Ok(Self {
            store,
            pow,
            last_hash,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Cached hash of the newest block.
    pub fn last_hash(&self) -> Hash {
        self.last_hash
    }

    pub fn add_block(&mut self, data: impl Into<Vec<u8>>) -> Result<Block> {
        self.add_block_with(data, &MineControl::unbounded())
    }

    /// Mines a block on the cached tip and appends it.
    pub fn add_block_with(&mut self, data: impl Into<Vec<u8>>, ctl: &MineControl) -> Result<Block> {
        let block = Block::create(data, Some(self.last_hash), &self.pow, ctl)?;
        self.store.append(&block)?;
        self.last_hash = block.hash();
        Ok(block)
    }

    /// Cursor from the current tip back to genesis.
    pub fn iter(&self) -> BlockchainIterator<S> {
        BlockchainIterator {
            store: Arc::clone(&self.store),
            current_hash: Some(self.last_hash),
            failed: false,
        }
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}

/// Newest-to-oldest cursor. Does not write to the store.
pub struct BlockchainIterator<S: ChainStore> {
    store: Arc<S>,
    current_hash: Option<Hash>,
    failed: bool,
}

impl<S: ChainStore> BlockchainIterator<S> {
    pub fn has_next(&self) -> bool {
        self.current_hash.is_some()
    }

    /// Reads the block at the cursor and steps to its parent.
    pub fn next_block(&mut self) -> Result<Block> {
        let hash = self.current_hash.ok_or(ChainError::Exhausted)?;
        let block = self.store.get(&hash)?;
        self.current_hash = block.prev_hash().copied();
        Ok(block)
    }
}

impl<S: ChainStore> Iterator for BlockchainIterator<S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }
        let item = self.next_block();
        self.failed = item.is_err();
        Some(item)
    }
}

impl<S: ChainStore> std::iter::FusedIterator for BlockchainIterator<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store with the same transactional contract.
    #[derive(Default)]
    struct MemStore {
        inner: Mutex<MemInner>,
    }

    #[derive(Default)]
    struct MemInner {
        blocks: HashMap<Hash, Block>,
        tip: Option<Hash>,
    }

    impl ChainStore for MemStore {
        fn put_genesis_if_absent(&self, genesis: &Block) -> Result<Hash> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(tip) = inner.tip {
                return Ok(tip);
            }
            inner.blocks.insert(genesis.hash(), genesis.clone());
            inner.tip = Some(genesis.hash());
            Ok(genesis.hash())
        }

        fn append(&self, block: &Block) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.tip.as_ref() != block.prev_hash() {
                return Err(ChainError::StaleTip {
                    expected: hex::encode(block.prev_hash_bytes()),
                    found: inner.tip.map(hex::encode).unwrap_or_default(),
                });
            }
            inner.blocks.insert(block.hash(), block.clone());
            inner.tip = Some(block.hash());
            Ok(())
        }

        fn get(&self, hash: &Hash) -> Result<Block> {
            let inner = self.inner.lock().unwrap();
            inner
                .blocks
                .get(hash)
                .cloned()
                .ok_or_else(|| ChainError::NotFound(hex::encode(hash)))
        }

        fn latest_hash(&self) -> Result<Option<Hash>> {
            Ok(self.inner.lock().unwrap().tip)
        }

        fn set_latest_hash(&self, hash: &Hash) -> Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if !inner.blocks.contains_key(hash) {
                return Err(ChainError::NotFound(hex::encode(hash)));
            }
            inner.tip = Some(*hash);
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn init_bootstraps_genesis() {
        let store = Arc::new(MemStore::default());
        assert!(!store.has_chain().unwrap());
        let chain = Blockchain::init(store.clone()).unwrap();
        assert!(store.has_chain().unwrap());
        let genesis = store.get(&chain.last_hash()).unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.data(), b"Genesis");
    }

    #[test]
    fn init_twice_is_idempotent() {
        let store = Arc::new(MemStore::default());
        let mut chain = Blockchain::init(store.clone()).unwrap();
        chain.add_block("First").unwrap();
        let tip = chain.last_hash();
        drop(chain);

        let again = Blockchain::init(store.clone()).unwrap();
        assert_eq!(again.last_hash(), tip);
        assert_eq!(again.iter().count(), 2);
    }

    #[test]
    fn first_second_scenario() {
        let store = Arc::new(MemStore::default());
        let mut chain = Blockchain::init(store).unwrap();
        let first = chain.add_block("First").unwrap();
        let second = chain.add_block("Second").unwrap();

        let mut iter = chain.iter();
        let b1 = iter.next_block().unwrap();
        assert_eq!(b1, second);
        assert_eq!(b1.prev_hash(), Some(&first.hash()));

        let b2 = iter.next_block().unwrap();
        assert_eq!(b2, first);

        let b3 = iter.next_block().unwrap();
        assert_eq!(b3.data(), b"Genesis");
        assert!(b3.prev_hash_bytes().is_empty());
        assert_eq!(b2.prev_hash(), Some(&b3.hash()));

        assert!(!iter.has_next());
        assert!(matches!(iter.next_block(), Err(ChainError::Exhausted)));
    }

    #[test]
    fn iterator_yields_links_in_order() {
        let store = Arc::new(MemStore::default());
        let mut chain = Blockchain::init(store).unwrap();
        for i in 0..4 {
            chain.add_block(format!("block {i}")).unwrap();
        }
        let blocks: Vec<Block> = chain.iter().collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 5);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].prev_hash(), Some(&pair[1].hash()));
        }
        assert!(blocks.last().unwrap().is_genesis());
        assert!(blocks.iter().all(|b| chain.pow().validate(b)));
    }

    #[test]
    fn iterator_stops_after_broken_link() {
        let store = Arc::new(MemStore::default());
        let mut chain = Blockchain::init(store.clone()).unwrap();
        chain.add_block("First").unwrap();
        let genesis_hash = chain.iter().last().unwrap().unwrap().hash();
        store.inner.lock().unwrap().blocks.remove(&genesis_hash);

        let items: Vec<_> = chain.iter().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(ChainError::NotFound(_))));
    }

    #[test]
    fn cancelled_add_leaves_chain_untouched() {
        let store = Arc::new(MemStore::default());
        let mut chain = Blockchain::init(store.clone()).unwrap();
        let tip = chain.last_hash();
        let token = crate::pow::CancelToken::new();
        token.cancel();
        let ctl = MineControl::unbounded().with_cancel(token);
        let err = chain.add_block_with("never", &ctl).unwrap_err();
        assert!(matches!(err, ChainError::MiningCancelled { .. }));
        assert_eq!(chain.last_hash(), tip);
        assert_eq!(store.latest_hash().unwrap(), Some(tip));
    }

    #[test]
    fn stale_handle_cannot_orphan_a_block() {
        let store = Arc::new(MemStore::default());
        let mut a = Blockchain::init(store.clone()).unwrap();
        let mut b = Blockchain::init(store.clone()).unwrap();
        a.add_block("from a").unwrap();
        let err = b.add_block("from b").unwrap_err();
        assert!(matches!(err, ChainError::StaleTip { .. }));
        assert_eq!(store.latest_hash().unwrap(), Some(a.last_hash()));
    }
}
