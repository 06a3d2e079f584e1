//! Self and community stake positions: deposit, lock extension and withdrawal.
//!
//! A new deposit or extension re-locks the whole position, so the unlock time only ever moves
//! forward. Every change to a position's `amount` is mirrored in the staker's aggregate total.

use crate::error::{Result, StakingError};
use crate::math::{add, sub};
use crate::ExecutionContext;
use idstake_types::params::{MAX_LOCK_DURATION, MIN_LOCK_DURATION};
use idstake_types::stake::StakeKey;
use idstake_types::{format_address, Address, StakingEvent, NULL_ADDRESS};
use tracing::info;

pub fn self_stake(
    ctx: &mut ExecutionContext,
    staker: &Address,
    amount: u128,
    duration: u64,
) -> Result<()> {
    add_stake(ctx, StakeKey::SelfStake(*staker), amount, duration)
}

pub fn extend_self_stake(ctx: &mut ExecutionContext, staker: &Address, duration: u64) -> Result<()> {
    extend_stake(ctx, StakeKey::SelfStake(*staker), duration)
}

pub fn withdraw_self_stake(ctx: &mut ExecutionContext, staker: &Address, amount: u128) -> Result<()> {
    withdraw_stake(ctx, StakeKey::SelfStake(*staker), amount)
}

pub fn community_stake(
    ctx: &mut ExecutionContext,
    staker: &Address,
    stakee: &Address,
    amount: u128,
    duration: u64,
) -> Result<()> {
    let key = community_key(staker, stakee)?;
    add_stake(ctx, key, amount, duration)
}

pub fn extend_community_stake(
    ctx: &mut ExecutionContext,
    staker: &Address,
    stakee: &Address,
    duration: u64,
) -> Result<()> {
    let key = community_key(staker, stakee)?;
    extend_stake(ctx, key, duration)
}

pub fn withdraw_community_stake(
    ctx: &mut ExecutionContext,
    staker: &Address,
    stakee: &Address,
    amount: u128,
) -> Result<()> {
    let key = community_key(staker, stakee)?;
    withdraw_stake(ctx, key, amount)
}

fn community_key(staker: &Address, stakee: &Address) -> Result<StakeKey> {
    if *stakee == NULL_ADDRESS {
        return Err(StakingError::InvalidAccount);
    }
    if stakee == staker {
        return Err(StakingError::SelfTarget);
    }
    Ok(StakeKey::Community {
        staker: *staker,
        stakee: *stakee,
    })
}

/// Unlock time for a lock of `duration` starting now. Must fall inside the lock bounds and must
/// not end before the position's current lock.
fn new_unlock_time(now: u64, duration: u64, current_unlock: u64) -> Result<u64> {
    let unlock_time = now
        .checked_add(duration)
        .ok_or(StakingError::InvalidLockDuration { duration })?;
    let earliest = now.saturating_add(MIN_LOCK_DURATION);
    let latest = now.saturating_add(MAX_LOCK_DURATION);
    if unlock_time < earliest || unlock_time > latest {
        return Err(StakingError::InvalidLockDuration { duration });
    }
    if unlock_time < current_unlock {
        return Err(StakingError::LockShortened {
            current: current_unlock,
            requested: unlock_time,
        });
    }
    Ok(unlock_time)
}

fn add_stake(ctx: &mut ExecutionContext, key: StakeKey, amount: u128, duration: u64) -> Result<()> {
    if amount == 0 {
        return Err(StakingError::ZeroAmount);
    }

    let staker = key.staker();
    let mut stake = ctx.state.stake(&key);
    stake.unlock_time = new_unlock_time(ctx.timestamp, duration, stake.unlock_time)?;
    stake.amount = add(stake.amount, amount, "stake amount")?;
    let total = add(ctx.state.total_staked(&staker), amount, "total staked")?;

    ctx.custodian.deposit_from(&staker, amount)?;

    ctx.state.set_stake(key, stake);
    ctx.state.total_staked.insert(staker, total);
    info!(
        staker = %format_address(&staker),
        stakee = %format_address(&key.stakee()),
        amount,
        unlock_time = stake.unlock_time,
        "stake added"
    );
    ctx.emit(stake_event(key, amount, stake.unlock_time));
    Ok(())
}

fn extend_stake(ctx: &mut ExecutionContext, key: StakeKey, duration: u64) -> Result<()> {
    let mut stake = ctx.state.stake(&key);
    if stake.amount == 0 {
        return Err(StakingError::NoActiveStake);
    }
    stake.unlock_time = new_unlock_time(ctx.timestamp, duration, stake.unlock_time)?;

    ctx.state.set_stake(key, stake);
    info!(
        staker = %format_address(&key.staker()),
        unlock_time = stake.unlock_time,
        "stake extended"
    );
    ctx.emit(stake_event(key, 0, stake.unlock_time));
    Ok(())
}

fn withdraw_stake(ctx: &mut ExecutionContext, key: StakeKey, amount: u128) -> Result<()> {
    if amount == 0 {
        return Err(StakingError::ZeroAmount);
    }

    let staker = key.staker();
    let mut stake = ctx.state.stake(&key);
    if stake.is_locked(ctx.timestamp) {
        return Err(StakingError::StakeLocked {
            unlock_time: stake.unlock_time,
        });
    }
    if amount > stake.amount {
        return Err(StakingError::InsufficientStake {
            requested: amount,
            available: stake.amount,
        });
    }
    stake.amount -= amount;
    let total = sub(ctx.state.total_staked(&staker), amount, "total staked")?;

    ctx.custodian.withdraw_to(&staker, amount)?;

    ctx.state.set_stake(key, stake);
    ctx.state.total_staked.insert(staker, total);
    info!(staker = %format_address(&staker), amount, "stake withdrawn");
    ctx.emit(match key {
        StakeKey::SelfStake(staker) => StakingEvent::SelfStakeWithdrawn { staker, amount },
        StakeKey::Community { staker, stakee } => StakingEvent::CommunityStakeWithdrawn {
            staker,
            stakee,
            amount,
        },
    });
    Ok(())
}

fn stake_event(key: StakeKey, amount: u128, unlock_time: u64) -> StakingEvent {
    match key {
        StakeKey::SelfStake(staker) => StakingEvent::SelfStake {
            staker,
            amount,
            unlock_time,
        },
        StakeKey::Community { staker, stakee } => StakingEvent::CommunityStake {
            staker,
            stakee,
            amount,
            unlock_time,
        },
    }
}
