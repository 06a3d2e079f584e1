//! Batch slashing and the per-round accumulator of funds awaiting burn.
//!
//! A position slashed in round `r` parks its frozen funds in bucket `r`. Slashing it again in
//! round `r + 1` moves the whole frozen amount into bucket `r + 1`, restarting its appeal window.
//! A position last slashed two or more rounds ago has already been burned, so its frozen amount
//! is dropped before the new slash is recorded.

use crate::auth::require;
use crate::error::{Result, StakingError};
use crate::math::{add, percent_of, sub};
use crate::ExecutionContext;
use idstake_types::access::Capability;
use idstake_types::params::MAX_PERCENT;
use idstake_types::stake::{Stake, StakeKey};
use idstake_types::state::LedgerState;
use idstake_types::{format_address, Address, StakingEvent};
use std::collections::BTreeMap;
use tracing::info;

pub fn slash(
    ctx: &mut ExecutionContext,
    caller: &Address,
    self_stakers: &[Address],
    community_stakers: &[Address],
    community_stakees: &[Address],
    percent: u64,
) -> Result<()> {
    require(&*ctx.gate, caller, Capability::Slash)?;

    if percent == 0 || percent > MAX_PERCENT {
        return Err(StakingError::InvalidPercent(percent));
    }
    if community_stakers.len() != community_stakees.len() {
        return Err(StakingError::MismatchedTargets {
            stakers: community_stakers.len(),
            stakees: community_stakees.len(),
        });
    }

    let targets = self_stakers
        .iter()
        .map(|staker| StakeKey::SelfStake(*staker))
        .chain(
            community_stakers
                .iter()
                .zip(community_stakees)
                .map(|(staker, stakee)| StakeKey::Community {
                    staker: *staker,
                    stakee: *stakee,
                }),
        );

    let mut batch = SlashBatch::new(ctx.state.clock.current_round);
    for key in targets {
        batch.apply(ctx.state, key, percent)?;
    }

    info!(
        round = batch.round,
        targets = batch.events.len(),
        percent,
        pending = batch.bucket(ctx.state, batch.round),
        "slash applied"
    );
    for event in batch.commit(ctx.state) {
        ctx.emit(event);
    }
    Ok(())
}

/// Staged slash results, written to the ledger only once every target has been applied.
/// Reads fall through to the ledger for anything the batch has not touched yet, so a target
/// listed twice sees its own earlier slash.
struct SlashBatch {
    round: u64,
    stakes: BTreeMap<StakeKey, Stake>,
    totals: BTreeMap<Address, u128>,
    buckets: BTreeMap<u64, u128>,
    events: Vec<StakingEvent>,
}

impl SlashBatch {
    fn new(round: u64) -> Self {
        Self {
            round,
            stakes: BTreeMap::new(),
            totals: BTreeMap::new(),
            buckets: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn stake(&self, state: &LedgerState, key: &StakeKey) -> Stake {
        self.stakes
            .get(key)
            .copied()
            .unwrap_or_else(|| state.stake(key))
    }

    fn total(&self, state: &LedgerState, account: &Address) -> u128 {
        self.totals
            .get(account)
            .copied()
            .unwrap_or_else(|| state.total_staked(account))
    }

    fn bucket(&self, state: &LedgerState, round: u64) -> u128 {
        self.buckets
            .get(&round)
            .copied()
            .unwrap_or_else(|| state.pending_burn(round))
    }

    fn apply(&mut self, state: &LedgerState, key: StakeKey, percent: u64) -> Result<()> {
        let round = self.round;
        let staker = key.staker();
        let mut stake = self.stake(state, &key);
        let delta = percent_of(stake.amount, percent)?;

        let mut current_bucket = self.bucket(state, round);
        if stake.was_slashed() && stake.slashed_in_round != round {
            if stake.slashed_in_round == round - 1 {
                let previous = sub(
                    self.bucket(state, round - 1),
                    stake.slashed_amount,
                    "previous round bucket",
                )?;
                self.buckets.insert(round - 1, previous);
                current_bucket = add(current_bucket, stake.slashed_amount, "round bucket")?;
            } else {
                stake.slashed_amount = 0;
            }
        }

        current_bucket = add(current_bucket, delta, "round bucket")?;
        stake.slashed_in_round = round;
        stake.slashed_amount = add(stake.slashed_amount, delta, "slashed amount")?;
        stake.amount = sub(stake.amount, delta, "stake amount")?;
        let total = sub(self.total(state, &staker), delta, "total staked")?;

        self.buckets.insert(round, current_bucket);
        self.stakes.insert(key, stake);
        self.totals.insert(staker, total);
        info!(
            staker = %format_address(&staker),
            stakee = %format_address(&key.stakee()),
            delta,
            frozen = stake.slashed_amount,
            round,
            "position slashed"
        );
        self.events.push(StakingEvent::Slash {
            staker,
            amount: delta,
            round,
        });
        Ok(())
    }

    fn commit(self, state: &mut LedgerState) -> Vec<StakingEvent> {
        for (key, stake) in self.stakes {
            state.set_stake(key, stake);
        }
        state.total_staked.extend(self.totals);
        state.slashed_per_round.extend(self.buckets);
        self.events
    }
}
