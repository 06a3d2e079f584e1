//! Admin changes to the capability holders behind the authorization gate. Allowed while the
//! ledger is paused so a compromised holder can be removed before unpausing.

use crate::error::{Result, StakingError};
use crate::ExecutionContext;
use idstake_types::access::Capability;
use idstake_types::{format_address, Address, StakingEvent, NULL_ADDRESS};
use tracing::info;

pub fn grant_capability(
    ctx: &mut ExecutionContext,
    caller: &Address,
    capability: Capability,
    account: &Address,
) -> Result<()> {
    if *account == NULL_ADDRESS {
        return Err(StakingError::InvalidAccount);
    }
    let added = ctx.gate.grant(caller, capability, *account)?;
    info!(
        %capability,
        account = %format_address(account),
        added,
        "capability granted"
    );
    ctx.emit(StakingEvent::CapabilityGranted {
        capability,
        account: *account,
    });
    Ok(())
}

pub fn revoke_capability(
    ctx: &mut ExecutionContext,
    caller: &Address,
    capability: Capability,
    account: &Address,
) -> Result<()> {
    let removed = ctx.gate.revoke(caller, capability, account)?;
    info!(
        %capability,
        account = %format_address(account),
        removed,
        "capability revoked"
    );
    ctx.emit(StakingEvent::CapabilityRevoked {
        capability,
        account: *account,
    });
    Ok(())
}
