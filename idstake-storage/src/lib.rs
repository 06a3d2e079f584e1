//! Persistence for ledger snapshots. The execution engine never touches storage; the node
//! loads a snapshot at startup and saves it after every applied transaction.

#[cfg(feature = "rocksdb")]
pub mod db;
pub mod file;
pub mod memory;

use anyhow::Result;
use idstake_types::state::LedgerSnapshot;

pub use file::FileStore;
pub use memory::MemoryStore;

pub trait StateStore: Send + Sync {
    /// `None` when nothing has been saved yet.
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>>;
    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()>;
}

/// Opens the store for `data_dir`: RocksDB when compiled in, otherwise a snapshot file.
pub fn open(data_dir: &std::path::Path) -> Result<Box<dyn StateStore>> {
    #[cfg(feature = "rocksdb")]
    {
        Ok(Box::new(db::RocksStore::new(data_dir)?))
    }

    #[cfg(not(feature = "rocksdb"))]
    {
        Ok(Box::new(FileStore::new(data_dir)?))
    }
}
