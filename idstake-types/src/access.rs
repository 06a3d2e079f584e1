use crate::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Privileged capabilities checked by the authorization gate.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Slash,
    Release,
    Pause,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Slash => "slash",
            Capability::Release => "release",
            Capability::Pause => "pause",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slash" | "slasher" => Ok(Capability::Slash),
            "release" | "releaser" => Ok(Capability::Release),
            "pause" | "pauser" => Ok(Capability::Pause),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("only the admin may change role grants")]
    NotAdmin,
}

/// Role table backing the authorization gate. The admin may grant and revoke capabilities
/// but holds none implicitly.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    pub admin: Address,
    pub grants: BTreeMap<Capability, BTreeSet<Address>>,
}

impl RoleRegistry {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            grants: BTreeMap::new(),
        }
    }

    pub fn has(&self, account: &Address, capability: Capability) -> bool {
        self.grants
            .get(&capability)
            .map_or(false, |holders| holders.contains(account))
    }

    pub fn grant(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: Address,
    ) -> Result<bool, AccessError> {
        if *caller != self.admin {
            return Err(AccessError::NotAdmin);
        }
        Ok(self.grants.entry(capability).or_default().insert(account))
    }

    pub fn revoke(
        &mut self,
        caller: &Address,
        capability: Capability,
        account: &Address,
    ) -> Result<bool, AccessError> {
        if *caller != self.admin {
            return Err(AccessError::NotAdmin);
        }
        Ok(self
            .grants
            .get_mut(&capability)
            .map_or(false, |holders| holders.remove(account)))
    }

    pub fn holders(&self, capability: Capability) -> Vec<Address> {
        self.grants
            .get(&capability)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_changes_grants() {
        let admin = [9u8; 32];
        let slasher = [1u8; 32];
        let mut roles = RoleRegistry::new(admin);

        assert_eq!(
            roles.grant(&slasher, Capability::Slash, slasher),
            Err(AccessError::NotAdmin)
        );
        assert_eq!(roles.grant(&admin, Capability::Slash, slasher), Ok(true));
        assert!(roles.has(&slasher, Capability::Slash));
        assert!(!roles.has(&slasher, Capability::Release));
        assert!(!roles.has(&admin, Capability::Slash));

        assert_eq!(roles.revoke(&admin, Capability::Slash, &slasher), Ok(true));
        assert!(!roles.has(&slasher, Capability::Slash));
    }

    #[test]
    fn capability_parses_role_names() {
        assert_eq!("SLASHER".parse::<Capability>(), Ok(Capability::Slash));
        assert_eq!("release".parse::<Capability>(), Ok(Capability::Release));
        assert!("mint".parse::<Capability>().is_err());
    }
}
