use crate::StateStore;
use anyhow::{anyhow, Result};
use idstake_types::stake::Stake;
use idstake_types::state::{LedgerSnapshot, LedgerState, RoundClock};
use idstake_types::Address;
use rocksdb::{Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

// One key prefix per logical table.
const SELF_STAKES: &[u8] = b"self/";
const COMMUNITY_STAKES: &[u8] = b"community/";
const TOTALS: &[u8] = b"total/";
const ROUNDS: &[u8] = b"round/";
const NONCES: &[u8] = b"nonce/";
const CLOCK: &[u8] = b"meta/clock";
const LIFECYCLE: &[u8] = b"meta/lifecycle";
const ROLES: &[u8] = b"meta/roles";
const CUSTODY: &[u8] = b"meta/custody";

pub struct RocksStore {
    pub db: DB,
}

fn key(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| anyhow!("Serialization error: {}", e))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| anyhow!("Deserialization error: {}", e))
}

fn address(bytes: &[u8]) -> Result<Address> {
    bytes
        .try_into()
        .map_err(|_| anyhow!("Corrupt key: expected 32 address bytes, got {}", bytes.len()))
}

impl RocksStore {
    pub fn new(path: &Path) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path).map_err(|e| anyhow!("Failed to open DB: {}", e))?;
        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key).map_err(|e| anyhow!("DB read error: {}", e))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Visits every entry under `prefix`, handing over the key with the prefix stripped.
    fn scan(&self, prefix: &[u8], mut visit: impl FnMut(&[u8], &[u8]) -> Result<()>) -> Result<()> {
        for item in self.db.prefix_iterator(prefix) {
            let (k, v) = item.map_err(|e| anyhow!("DB iteration error: {}", e))?;
            if !k.starts_with(prefix) {
                break;
            }
            visit(&k[prefix.len()..], &v)?;
        }
        Ok(())
    }

    fn load_state(&self, clock: RoundClock) -> Result<LedgerState> {
        let mut state = LedgerState {
            clock,
            ..Default::default()
        };

        self.scan(SELF_STAKES, |k, v| {
            state.self_stakes.insert(address(k)?, decode::<Stake>(v)?);
            Ok(())
        })?;
        self.scan(COMMUNITY_STAKES, |k, v| {
            if k.len() != 64 {
                return Err(anyhow!("Corrupt community key of {} bytes", k.len()));
            }
            let pair = (address(&k[..32])?, address(&k[32..])?);
            state.community_stakes.insert(pair, decode::<Stake>(v)?);
            Ok(())
        })?;
        self.scan(TOTALS, |k, v| {
            state.total_staked.insert(address(k)?, decode::<u128>(v)?);
            Ok(())
        })?;
        self.scan(ROUNDS, |k, v| {
            let round = u64::from_be_bytes(
                k.try_into()
                    .map_err(|_| anyhow!("Corrupt round key of {} bytes", k.len()))?,
            );
            state.slashed_per_round.insert(round, decode::<u128>(v)?);
            Ok(())
        })?;
        self.scan(NONCES, |k, v| {
            state.nonces.insert(address(k)?, decode::<u64>(v)?);
            Ok(())
        })?;

        Ok(state)
    }
}

impl StateStore for RocksStore {
    fn load_snapshot(&self) -> Result<Option<LedgerSnapshot>> {
        let clock: RoundClock = match self.get(CLOCK)? {
            Some(clock) => clock,
            None => return Ok(None),
        };
        Ok(Some(LedgerSnapshot {
            state: self.load_state(clock)?,
            lifecycle: self.get(LIFECYCLE)?.unwrap_or_default(),
            roles: self.get(ROLES)?.unwrap_or_default(),
            custody: self.get(CUSTODY)?.unwrap_or_default(),
        }))
    }

    fn save_snapshot(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let state = &snapshot.state;
        let mut batch = WriteBatch::default();

        // Positions are never deleted, so rewriting every row keeps the tables exact.
        for (staker, stake) in &state.self_stakes {
            batch.put(key(SELF_STAKES, &[staker.as_slice()]), encode(stake)?);
        }
        for ((staker, stakee), stake) in &state.community_stakes {
            batch.put(key(COMMUNITY_STAKES, &[staker.as_slice(), stakee.as_slice()]), encode(stake)?);
        }
        for (account, total) in &state.total_staked {
            batch.put(key(TOTALS, &[account.as_slice()]), encode(total)?);
        }
        for (round, amount) in &state.slashed_per_round {
            batch.put(key(ROUNDS, &[round.to_be_bytes().as_slice()]), encode(amount)?);
        }
        for (account, nonce) in &state.nonces {
            batch.put(key(NONCES, &[account.as_slice()]), encode(nonce)?);
        }
        batch.put(CLOCK, encode(&state.clock)?);
        batch.put(LIFECYCLE, encode(&snapshot.lifecycle)?);
        batch.put(ROLES, encode(&snapshot.roles)?);
        batch.put(CUSTODY, encode(&snapshot.custody)?);

        self.db.write(batch).map_err(|e| anyhow!("DB write error: {}", e))?;
        debug!(round = state.clock.current_round, "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_types::stake::StakeKey;

    #[test]
    fn tables_round_trip_through_rocksdb() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::new(dir.path()).unwrap();
        assert!(store.load_snapshot().unwrap().is_none());

        let mut snapshot = LedgerSnapshot::default();
        let state = &mut snapshot.state;
        state.set_stake(
            StakeKey::SelfStake([1u8; 32]),
            Stake {
                amount: 5,
                slashed_amount: 5,
                slashed_in_round: 2,
                unlock_time: 10,
            },
        );
        state.set_stake(
            StakeKey::Community {
                staker: [1u8; 32],
                stakee: [2u8; 32],
            },
            Stake {
                amount: 3,
                ..Default::default()
            },
        );
        state.total_staked.insert([1u8; 32], 8);
        state.slashed_per_round.insert(2, 5);
        state.slashed_per_round.insert(300, 1);
        state.nonces.insert([1u8; 32], 4);
        state.clock.current_round = 2;
        snapshot.custody.burned = 77;

        store.save_snapshot(&snapshot).unwrap();
        assert_eq!(store.load_snapshot().unwrap(), Some(snapshot));
    }
}
