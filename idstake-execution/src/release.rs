//! Reversal of a slash that has not been burned yet. Released funds return to the live
//! amount of the position; no tokens move.

use crate::auth::require;
use crate::error::{Result, StakingError};
use crate::math::{add, sub};
use crate::ExecutionContext;
use idstake_types::access::Capability;
use idstake_types::stake::StakeKey;
use idstake_types::{format_address, Address, StakingEvent, NULL_ADDRESS};
use tracing::info;

pub fn release(
    ctx: &mut ExecutionContext,
    caller: &Address,
    staker: &Address,
    stakee: &Address,
    amount: u128,
    slash_round: u64,
) -> Result<()> {
    require(&*ctx.gate, caller, Capability::Release)?;

    let oldest_unburned = ctx.state.clock.round_to_burn();
    if slash_round < oldest_unburned {
        return Err(StakingError::RoundAlreadyBurned { round: slash_round });
    }
    if *staker == NULL_ADDRESS || *stakee == NULL_ADDRESS {
        return Err(StakingError::InvalidAccount);
    }
    if amount == 0 {
        return Err(StakingError::ZeroAmount);
    }

    let key = StakeKey::for_pair(*staker, *stakee);
    let mut stake = ctx.state.stake(&key);
    if amount > stake.slashed_amount {
        return Err(StakingError::ReleaseExceedsSlashed {
            requested: amount,
            available: stake.slashed_amount,
        });
    }
    if stake.slashed_in_round != slash_round {
        return Err(StakingError::WrongSlashRound {
            requested: slash_round,
            actual: stake.slashed_in_round,
        });
    }

    stake.slashed_amount -= amount;
    stake.amount = add(stake.amount, amount, "stake amount")?;
    let bucket = sub(ctx.state.pending_burn(slash_round), amount, "round bucket")?;
    let total = add(ctx.state.total_staked(staker), amount, "total staked")?;

    ctx.state.set_stake(key, stake);
    ctx.state.slashed_per_round.insert(slash_round, bucket);
    ctx.state.total_staked.insert(*staker, total);
    info!(
        staker = %format_address(staker),
        stakee = %format_address(stakee),
        amount,
        round = slash_round,
        "slash released"
    );
    ctx.emit(StakingEvent::Release {
        staker: *staker,
        stakee: *stakee,
        amount,
        round: slash_round,
    });
    Ok(())
}
