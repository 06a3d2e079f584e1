use crate::StateStore;
use anyhow::{anyhow, Result};
use idstake_types::state::LedgerSnapshot;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<LedgerSnapshot>>,
}

impl StateStore for MemoryStore {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        let guard = self.snapshot.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        Ok(guard.clone())
    }

    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let mut guard = self.snapshot.lock().map_err(|_| anyhow!("memory store poisoned"))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
