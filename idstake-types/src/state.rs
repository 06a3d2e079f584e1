use crate::access::RoleRegistry;
use crate::custody::TokenLedger;
use crate::params::DEFAULT_ROUND_DURATION;
use crate::stake::{Stake, StakeKey};
use crate::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    pub current_round: u64,
    pub last_advance_time: u64,
    /// Fixed at initialization.
    pub minimum_round_duration: u64,
}

impl RoundClock {
    pub fn new(deployed_at: u64, minimum_round_duration: u64) -> Self {
        Self {
            current_round: 1,
            last_advance_time: deployed_at,
            minimum_round_duration,
        }
    }

    /// Earliest timestamp at which the next advance is accepted.
    pub fn next_advance_at(&self) -> u64 {
        self.last_advance_time
            .saturating_add(self.minimum_round_duration)
    }

    /// The round whose bucket the next advance burns.
    pub fn round_to_burn(&self) -> u64 {
        self.current_round - 1
    }
}

impl Default for RoundClock {
    fn default() -> Self {
        Self::new(0, DEFAULT_ROUND_DURATION)
    }
}

/// Pause flag owned by the lifecycle gate, kept apart from the ledger tables.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lifecycle {
    pub paused: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    pub self_stakes: BTreeMap<Address, Stake>,
    pub community_stakes: BTreeMap<(Address, Address), Stake>,
    /// Self-stake amount plus community stakes placed by the account.
    pub total_staked: BTreeMap<Address, u128>,
    /// Pending-burn amount per slash round.
    pub slashed_per_round: BTreeMap<u64, u128>,
    pub clock: RoundClock,
    pub nonces: BTreeMap<Address, u64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("total staked for {account} is {recorded}, positions sum to {expected}")]
    TotalMismatch {
        account: String,
        recorded: u128,
        expected: u128,
    },
    #[error("round {round} pending burn is {recorded}, positions parked there sum to {expected}")]
    RoundMismatch {
        round: u64,
        recorded: u128,
        expected: u128,
    },
    #[error("position sums overflow u128")]
    Overflow,
}

impl LedgerState {
    pub fn new(deployed_at: u64, minimum_round_duration: u64) -> Self {
        Self {
            clock: RoundClock::new(deployed_at, minimum_round_duration),
            ..Default::default()
        }
    }

    pub fn self_stake(&self, staker: &Address) -> Stake {
        self.self_stakes.get(staker).copied().unwrap_or_default()
    }

    pub fn community_stake(&self, staker: &Address, stakee: &Address) -> Stake {
        self.community_stakes
            .get(&(*staker, *stakee))
            .copied()
            .unwrap_or_default()
    }

    pub fn stake(&self, key: &StakeKey) -> Stake {
        match key {
            StakeKey::SelfStake(staker) => self.self_stake(staker),
            StakeKey::Community { staker, stakee } => self.community_stake(staker, stakee),
        }
    }

    pub fn set_stake(&mut self, key: StakeKey, stake: Stake) {
        match key {
            StakeKey::SelfStake(staker) => {
                self.self_stakes.insert(staker, stake);
            }
            StakeKey::Community { staker, stakee } => {
                self.community_stakes.insert((staker, stakee), stake);
            }
        }
    }

    pub fn total_staked(&self, account: &Address) -> u128 {
        self.total_staked.get(account).copied().unwrap_or(0)
    }

    pub fn pending_burn(&self, round: u64) -> u128 {
        self.slashed_per_round.get(&round).copied().unwrap_or(0)
    }

    pub fn nonce(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or(0)
    }

    /// Community stakes other accounts have placed on `stakee`.
    pub fn stakes_on(&self, stakee: &Address) -> Vec<(Address, Stake)> {
        self.community_stakes
            .iter()
            .filter(|((_, target), _)| target == stakee)
            .map(|((staker, _), stake)| (*staker, *stake))
            .collect()
    }

    /// Recomputes aggregate totals and unburned round buckets from the positions and compares
    /// them with the recorded tables.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut expected_totals: BTreeMap<Address, u128> = BTreeMap::new();
        let mut expected_rounds: BTreeMap<u64, u128> = BTreeMap::new();

        let positions = self
            .self_stakes
            .iter()
            .map(|(staker, stake)| (*staker, stake))
            .chain(
                self.community_stakes
                    .iter()
                    .map(|((staker, _), stake)| (*staker, stake)),
            );

        for (staker, stake) in positions {
            let total = expected_totals.entry(staker).or_default();
            *total = total
                .checked_add(stake.amount)
                .ok_or(InvariantViolation::Overflow)?;
            if stake.was_slashed() {
                let bucket = expected_rounds.entry(stake.slashed_in_round).or_default();
                *bucket = bucket
                    .checked_add(stake.slashed_amount)
                    .ok_or(InvariantViolation::Overflow)?;
            }
        }

        let accounts = expected_totals.keys().chain(self.total_staked.keys());
        for account in accounts {
            let expected = expected_totals.get(account).copied().unwrap_or(0);
            let recorded = self.total_staked(account);
            if expected != recorded {
                return Err(InvariantViolation::TotalMismatch {
                    account: crate::format_address(account),
                    recorded,
                    expected,
                });
            }
        }

        // Rounds older than the burnable one are already burned and no longer tracked.
        let oldest_live = self.clock.round_to_burn();
        for round in oldest_live.max(1)..=self.clock.current_round {
            let expected = expected_rounds.get(&round).copied().unwrap_or(0);
            let recorded = self.pending_burn(round);
            if expected != recorded {
                return Err(InvariantViolation::RoundMismatch {
                    round,
                    recorded,
                    expected,
                });
            }
        }

        Ok(())
    }

    /// Commitment over the full ledger contents.
    pub fn root_hash(&self) -> [u8; 32] {
        let encoded = bincode::serialize(self).expect("ledger state serialization");
        *blake3::hash(&encoded).as_bytes()
    }
}

/// Everything a node persists: the ledger plus the collaborators' records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub state: LedgerState,
    pub lifecycle: Lifecycle,
    pub roles: RoleRegistry,
    pub custody: TokenLedger,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_clock_starts_in_round_one() {
        let clock = RoundClock::new(1_000, 50);
        assert_eq!(clock.current_round, 1);
        assert_eq!(clock.round_to_burn(), 0);
        assert_eq!(clock.next_advance_at(), 1_050);
        assert_eq!(LedgerState::default().clock.current_round, 1);
    }

    #[test]
    fn invariants_detect_total_drift() {
        let mut state = LedgerState::default();
        let staker = [1u8; 32];
        state.set_stake(
            StakeKey::SelfStake(staker),
            Stake {
                amount: 10,
                unlock_time: 5,
                ..Default::default()
            },
        );
        assert!(matches!(
            state.check_invariants(),
            Err(InvariantViolation::TotalMismatch { .. })
        ));

        state.total_staked.insert(staker, 10);
        assert_eq!(state.check_invariants(), Ok(()));
    }

    #[test]
    fn invariants_detect_round_drift() {
        let mut state = LedgerState::default();
        let staker = [1u8; 32];
        state.set_stake(
            StakeKey::Community {
                staker,
                stakee: [2u8; 32],
            },
            Stake {
                amount: 5,
                slashed_amount: 5,
                slashed_in_round: 1,
                unlock_time: 0,
            },
        );
        state.total_staked.insert(staker, 5);
        assert!(matches!(
            state.check_invariants(),
            Err(InvariantViolation::RoundMismatch { round: 1, .. })
        ));

        state.slashed_per_round.insert(1, 5);
        assert_eq!(state.check_invariants(), Ok(()));
    }
}
