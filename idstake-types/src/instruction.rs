use crate::access::Capability;
use crate::Address;
use serde::{Deserialize, Serialize};

/// Every operation the staking ledger accepts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum StakingInstruction {
    // ══════════════════════════════════════════════════════════════
    // Stake ledger
    // ══════════════════════════════════════════════════════════════
    SelfStake { amount: u128, duration: u64 },
    ExtendSelfStake { duration: u64 },
    WithdrawSelfStake { amount: u128 },
    CommunityStake { stakee: Address, amount: u128, duration: u64 },
    ExtendCommunityStake { stakee: Address, duration: u64 },
    WithdrawCommunityStake { stakee: Address, amount: u128 },

    // ══════════════════════════════════════════════════════════════
    // Slashing, rounds and release
    // ══════════════════════════════════════════════════════════════
    Slash {
        self_stakers: Vec<Address>,
        community_stakers: Vec<Address>,
        community_stakees: Vec<Address>,
        percent: u64,
    },
    AdvanceRound,
    Release {
        staker: Address,
        stakee: Address,
        amount: u128,
        slash_round: u64,
    },

    // ══════════════════════════════════════════════════════════════
    // Lifecycle
    // ══════════════════════════════════════════════════════════════
    Pause,
    Unpause,

    // ══════════════════════════════════════════════════════════════
    // Role administration
    // ══════════════════════════════════════════════════════════════
    GrantCapability { capability: Capability, account: Address },
    RevokeCapability { capability: Capability, account: Address },
}

impl StakingInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            StakingInstruction::SelfStake { .. } => "self_stake",
            StakingInstruction::ExtendSelfStake { .. } => "extend_self_stake",
            StakingInstruction::WithdrawSelfStake { .. } => "withdraw_self_stake",
            StakingInstruction::CommunityStake { .. } => "community_stake",
            StakingInstruction::ExtendCommunityStake { .. } => "extend_community_stake",
            StakingInstruction::WithdrawCommunityStake { .. } => "withdraw_community_stake",
            StakingInstruction::Slash { .. } => "slash",
            StakingInstruction::AdvanceRound => "advance_round",
            StakingInstruction::Release { .. } => "release",
            StakingInstruction::Pause => "pause",
            StakingInstruction::Unpause => "unpause",
            StakingInstruction::GrantCapability { .. } => "grant_capability",
            StakingInstruction::RevokeCapability { .. } => "revoke_capability",
        }
    }
}
