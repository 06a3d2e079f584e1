use crate::error::{Result, StakingError};
use idstake_types::access::{AccessError, Capability, RoleRegistry};
use idstake_types::{format_address, Address};

/// Answers whether a caller may exercise a privileged capability, and lets the gate's admin
/// change who may.
pub trait AuthorizationGate {
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool;

    /// Returns whether `account` newly holds the capability.
    fn grant(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: Address,
    ) -> Result<bool, AccessError>;

    /// Returns whether `account` held the capability before.
    fn revoke(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: &Address,
    ) -> Result<bool, AccessError>;
}

impl AuthorizationGate for RoleRegistry {
    fn is_authorized(&self, caller: &Address, capability: Capability) -> bool {
        self.has(caller, capability)
    }

    fn grant(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: Address,
    ) -> Result<bool, AccessError> {
        RoleRegistry::grant(self, caller, capability, account)
    }

    fn revoke(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: &Address,
    ) -> Result<bool, AccessError> {
        RoleRegistry::revoke(self, caller, capability, account)
    }
}

pub(crate) fn require(
    gate: &dyn AuthorizationGate,
    caller: &Address,
    capability: Capability,
) -> Result<()> {
    if gate.is_authorized(caller, capability) {
        Ok(())
    } else {
        Err(StakingError::Unauthorized {
            caller: format_address(caller),
            capability,
        })
    }
}
