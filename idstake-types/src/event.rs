use crate::access::Capability;
use crate::params::format_units;
use crate::{format_address, Address};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable record of a state change, one per successful operation (one per target for
/// slashes).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    /// Self-stake added or extended. `amount` is the increment, zero for a pure extension.
    SelfStake {
        staker: Address,
        amount: u128,
        unlock_time: u64,
    },
    SelfStakeWithdrawn {
        staker: Address,
        amount: u128,
    },
    CommunityStake {
        staker: Address,
        stakee: Address,
        amount: u128,
        unlock_time: u64,
    },
    CommunityStakeWithdrawn {
        staker: Address,
        stakee: Address,
        amount: u128,
    },
    Slash {
        staker: Address,
        amount: u128,
        round: u64,
    },
    Burn {
        round: u64,
        amount: u128,
    },
    Release {
        staker: Address,
        stakee: Address,
        amount: u128,
        round: u64,
    },
    Paused {
        by: Address,
    },
    Unpaused {
        by: Address,
    },
    CapabilityGranted {
        capability: Capability,
        account: Address,
    },
    CapabilityRevoked {
        capability: Capability,
        account: Address,
    },
}

impl fmt::Display for StakingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = format_address;
        match self {
            StakingEvent::SelfStake {
                staker,
                amount,
                unlock_time,
            } => write!(
                f,
                "SelfStake {} +{} until {}",
                addr(staker),
                format_units(*amount),
                unlock_time
            ),
            StakingEvent::SelfStakeWithdrawn { staker, amount } => write!(
                f,
                "SelfStakeWithdrawn {} {}",
                addr(staker),
                format_units(*amount)
            ),
            StakingEvent::CommunityStake {
                staker,
                stakee,
                amount,
                unlock_time,
            } => write!(
                f,
                "CommunityStake {} -> {} +{} until {}",
                addr(staker),
                addr(stakee),
                format_units(*amount),
                unlock_time
            ),
            StakingEvent::CommunityStakeWithdrawn {
                staker,
                stakee,
                amount,
            } => write!(
                f,
                "CommunityStakeWithdrawn {} -> {} {}",
                addr(staker),
                addr(stakee),
                format_units(*amount)
            ),
            StakingEvent::Slash {
                staker,
                amount,
                round,
            } => write!(
                f,
                "Slash {} {} in round {}",
                addr(staker),
                format_units(*amount),
                round
            ),
            StakingEvent::Burn { round, amount } => {
                write!(f, "Burn round {} {}", round, format_units(*amount))
            }
            StakingEvent::Release {
                staker,
                stakee,
                amount,
                round,
            } => write!(
                f,
                "Release {} -> {} {} from round {}",
                addr(staker),
                addr(stakee),
                format_units(*amount),
                round
            ),
            StakingEvent::Paused { by } => write!(f, "Paused by {}", addr(by)),
            StakingEvent::Unpaused { by } => write!(f, "Unpaused by {}", addr(by)),
            StakingEvent::CapabilityGranted {
                capability,
                account,
            } => write!(f, "Granted {} to {}", capability, addr(account)),
            StakingEvent::CapabilityRevoked {
                capability,
                account,
            } => write!(f, "Revoked {} from {}", capability, addr(account)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::UNIT;

    #[test]
    fn display_uses_token_units() {
        let event = StakingEvent::Slash {
            staker: [0xab; 32],
            amount: 5 * UNIT / 2,
            round: 3,
        };
        let text = event.to_string();
        assert!(text.starts_with("Slash 0xabab"));
        assert!(text.ends_with("2.5 in round 3"));
    }
}
