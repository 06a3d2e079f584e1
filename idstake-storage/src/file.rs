use crate::StateStore;
use anyhow::{anyhow, Context, Result};
use idstake_types::state::LedgerSnapshot;
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "ledger.bin";

/// Whole-ledger bincode snapshot in a single file, replaced atomically on save.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;
        Ok(Self {
            path: data_dir.join(SNAPSHOT_FILE),
        })
    }
}

impl StateStore for FileStore {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let snapshot = bincode::deserialize(&bytes)
            .map_err(|e| anyhow!("Deserialization error: {}", e))?;
        Ok(Some(snapshot))
    }

    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let encoded = bincode::serialize(snapshot).map_err(|e| anyhow!("Serialization error: {}", e))?;
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, encoded).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_types::stake::{Stake, StakeKey};

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(store.load_snapshot().unwrap().is_none());

        let mut snapshot = LedgerSnapshot::default();
        snapshot.state.set_stake(
            StakeKey::Community {
                staker: [1u8; 32],
                stakee: [2u8; 32],
            },
            Stake {
                amount: 7,
                unlock_time: 99,
                ..Default::default()
            },
        );
        snapshot.state.slashed_per_round.insert(3, 11);
        snapshot.lifecycle.paused = true;
        store.save_snapshot(&snapshot).unwrap();

        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.load_snapshot().unwrap(), Some(snapshot));
    }
}
