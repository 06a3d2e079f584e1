use crate::Address;
use serde::{Deserialize, Serialize};

/// A single staking position, either self-stake or community-stake.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stake {
    /// Timestamp after which `amount` may be withdrawn.
    pub unlock_time: u64,
    /// Live, unslashed quantity in base units.
    pub amount: u128,
    /// Frozen quantity awaiting burn or release.
    pub slashed_amount: u128,
    /// Round in which `slashed_amount` is parked. Zero means never slashed.
    pub slashed_in_round: u64,
}

impl Stake {
    pub fn is_locked(&self, now: u64) -> bool {
        now < self.unlock_time
    }

    pub fn was_slashed(&self) -> bool {
        self.slashed_in_round != 0
    }
}

/// Identifies a position in the ledger.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StakeKey {
    SelfStake(Address),
    Community { staker: Address, stakee: Address },
}

impl StakeKey {
    /// Resolves a (staker, stakee) pair the way release does: equal accounts mean self-stake.
    pub fn for_pair(staker: Address, stakee: Address) -> Self {
        if staker == stakee {
            StakeKey::SelfStake(staker)
        } else {
            StakeKey::Community { staker, stakee }
        }
    }

    /// The account whose aggregate total this position counts towards.
    pub fn staker(&self) -> Address {
        match self {
            StakeKey::SelfStake(staker) => *staker,
            StakeKey::Community { staker, .. } => *staker,
        }
    }

    pub fn stakee(&self) -> Address {
        match self {
            StakeKey::SelfStake(staker) => *staker,
            StakeKey::Community { stakee, .. } => *stakee,
        }
    }
}
