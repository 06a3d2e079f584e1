//! Round clock. Each advance closes the current round and burns the bucket of the round before
//! it, so slashed funds sit through the rest of their own round and one full round after.

use crate::error::{Result, StakingError};
use crate::ExecutionContext;
use idstake_types::StakingEvent;
use tracing::info;

/// Advances the round clock and burns the bucket that has aged out. Returns the burned round
/// and amount. Callable by anyone once the minimum round duration has elapsed.
pub fn advance_round(ctx: &mut ExecutionContext) -> Result<(u64, u128)> {
    let clock = ctx.state.clock;
    if ctx.timestamp < clock.next_advance_at() {
        return Err(StakingError::RoundNotElapsed {
            round: clock.current_round,
            ready_at: clock.next_advance_at(),
        });
    }

    let round_to_burn = clock.round_to_burn();
    let amount_to_burn = ctx.state.pending_burn(round_to_burn);
    let next_round = clock
        .current_round
        .checked_add(1)
        .ok_or(StakingError::Overflow("round counter"))?;

    if amount_to_burn > 0 {
        ctx.custodian.burn(amount_to_burn)?;
    }

    ctx.state.clock.current_round = next_round;
    ctx.state.clock.last_advance_time = ctx.timestamp;
    info!(
        round = next_round,
        burned_round = round_to_burn,
        amount = amount_to_burn,
        "round advanced"
    );
    ctx.emit(StakingEvent::Burn {
        round: round_to_burn,
        amount: amount_to_burn,
    });
    Ok((round_to_burn, amount_to_burn))
}
