pub mod sled_store;

use powchain_core::{Blockchain, Result};
use std::path::Path;
use std::sync::Arc;

pub use sled_store::SledStore;

/// Opens the store at `path` and resumes or bootstraps the chain in it.
pub fn open_chain<P: AsRef<Path>>(path: P) -> Result<Blockchain<SledStore>> {
    let store = Arc::new(SledStore::open(path)?);
    Blockchain::init(store)
}
