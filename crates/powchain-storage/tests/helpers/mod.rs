use std::path::{Path, PathBuf};

use powchain_storage::SledStore;
use tempfile::{tempdir, TempDir};

pub fn create_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("blocks");
    (temp_dir, db_path)
}

pub fn create_temp_store() -> (TempDir, PathBuf, SledStore) {
    let (temp_dir, db_path) = create_temp_dir();
    let store = SledStore::open(&db_path).expect("Failed to open SledStore");
    (temp_dir, db_path, store)
}

/// Opens the raw sled database behind a closed store and applies `f`.
/// The caller must have dropped every handle on `path` first.
pub fn with_raw_db<F>(path: &Path, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&sled::Db) -> anyhow::Result<()>,
{
    let db = sled::Config::new().path(path).flush_every_ms(None).open()?;
    f(&db)?;
    db.flush()?;
    Ok(())
}

pub fn teardown(temp_dir: TempDir) {
    let root = temp_dir.path().to_path_buf();
    temp_dir.close().expect("Failed to delete temp dir");
    assert!(!root.exists(), "Database directory should be removed");
}
