//! Pause gate. While paused every ledger operation is refused; only the pause capability can
//! flip the flag.

use crate::auth::require;
use crate::error::{Result, StakingError};
use crate::ExecutionContext;
use idstake_types::access::Capability;
use idstake_types::{format_address, Address, StakingEvent};
use tracing::warn;

pub fn ensure_not_paused(ctx: &ExecutionContext) -> Result<()> {
    if ctx.lifecycle.paused {
        return Err(StakingError::Paused);
    }
    Ok(())
}

pub fn pause(ctx: &mut ExecutionContext, caller: &Address) -> Result<()> {
    require(&*ctx.gate, caller, Capability::Pause)?;
    ensure_not_paused(ctx)?;
    ctx.lifecycle.paused = true;
    warn!(by = %format_address(caller), "ledger paused");
    ctx.emit(StakingEvent::Paused { by: *caller });
    Ok(())
}

pub fn unpause(ctx: &mut ExecutionContext, caller: &Address) -> Result<()> {
    require(&*ctx.gate, caller, Capability::Pause)?;
    if !ctx.lifecycle.paused {
        return Err(StakingError::NotPaused);
    }
    ctx.lifecycle.paused = false;
    warn!(by = %format_address(caller), "ledger unpaused");
    ctx.emit(StakingEvent::Unpaused { by: *caller });
    Ok(())
}
