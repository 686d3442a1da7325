pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_BITS: u32 = (HASH_SIZE * BYTE) as u32;

/// Leading zero bits a block hash must carry. Mixed into every hash, so
/// changing it invalidates every block already stored.
pub const DIFFICULTY: u32 = 12;

const _: () = assert!(DIFFICULTY >= 1 && DIFFICULTY < HASH_BITS);

/// Safety ceiling for the nonce search.
pub const MAX_NONCE: u64 = i64::MAX as u64;

/// Nonces handed to each rayon batch by the parallel miner.
pub const PARALLEL_BATCH: u64 = 1 << 14;

pub const GENESIS_DATA: &[u8] = b"Genesis";

/// Reserved store key holding the hash of the latest block.
pub const LATEST_HASH_KEY: &[u8] = b"lh";

pub const DEFAULT_DB_PATH: &str = "/tmp/blocks";

/// Upper bound on an encoded block, enforced by the codec both ways.
pub const MAX_BLOCK_BYTES: u64 = 16 * 1024 * 1024;
