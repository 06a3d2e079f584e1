#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use idstake_execution::{execute_instruction, ExecutionContext};
use idstake_types::access::{Capability, RoleRegistry};
use idstake_types::instruction::StakingInstruction;
use idstake_types::stake::{Stake, StakeKey};
use idstake_types::state::LedgerSnapshot;

const OPERATOR: [u8; 32] = [9u8; 32];

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    sender_is_operator: bool,
    sender: [u8; 32],
    other: [u8; 32],
    balance: u128,
    staked: u128,
    slashed: u128,
    slashed_in_round: u8,
    current_round: u8,
    unlock_time: u64,
    timestamp: u64,
    amount: u128,
    duration: u64,
    percent: u64,
    round: u64,
    op: u8,
}

fuzz_target!(|data: FuzzInput| {
    let sender = if data.sender_is_operator {
        OPERATOR
    } else {
        data.sender
    };

    let mut snapshot = LedgerSnapshot::default();
    let mut roles = RoleRegistry::new(OPERATOR);
    for capability in [Capability::Slash, Capability::Release, Capability::Pause] {
        let _ = roles.grant(&OPERATOR, capability, OPERATOR);
    }
    snapshot.roles = roles;
    let _ = snapshot.custody.credit(sender, data.balance % (1 << 100));

    // One pre-existing position, kept consistent with the aggregate tables.
    let round = u64::from(data.current_round).max(1);
    let slashed_in_round = u64::from(data.slashed_in_round).min(round);
    let stake = Stake {
        unlock_time: data.unlock_time,
        amount: data.staked % (1 << 100),
        slashed_amount: if slashed_in_round == 0 { 0 } else { data.slashed % (1 << 100) },
        slashed_in_round,
    };
    snapshot.state.clock.current_round = round;
    snapshot.state.set_stake(StakeKey::SelfStake(sender), stake);
    snapshot.state.total_staked.insert(sender, stake.amount);
    snapshot.custody.custody = stake.amount + stake.slashed_amount;
    if stake.slashed_amount > 0 {
        snapshot.state.slashed_per_round.insert(slashed_in_round, stake.slashed_amount);
    }

    let si = match data.op % 11 {
        0 => StakingInstruction::SelfStake {
            amount: data.amount,
            duration: data.duration,
        },
        1 => StakingInstruction::ExtendSelfStake {
            duration: data.duration,
        },
        2 => StakingInstruction::WithdrawSelfStake {
            amount: data.amount,
        },
        3 => StakingInstruction::CommunityStake {
            stakee: data.other,
            amount: data.amount,
            duration: data.duration,
        },
        4 => StakingInstruction::WithdrawCommunityStake {
            stakee: data.other,
            amount: data.amount,
        },
        5 => StakingInstruction::Slash {
            self_stakers: vec![sender, data.other],
            community_stakers: vec![sender],
            community_stakees: vec![data.other],
            percent: data.percent,
        },
        6 => StakingInstruction::Release {
            staker: sender,
            stakee: sender,
            amount: data.amount,
            slash_round: data.round,
        },
        7 => StakingInstruction::AdvanceRound,
        8 => StakingInstruction::GrantCapability {
            capability: Capability::Slash,
            account: data.other,
        },
        9 => StakingInstruction::RevokeCapability {
            capability: Capability::Release,
            account: OPERATOR,
        },
        _ => StakingInstruction::Pause,
    };

    let before = snapshot.clone();
    let operator = OPERATOR;
    let privileged = matches!(
        si,
        StakingInstruction::Slash { .. }
            | StakingInstruction::Release { .. }
            | StakingInstruction::GrantCapability { .. }
            | StakingInstruction::RevokeCapability { .. }
    );
    let caller = if privileged { &operator } else { &sender };
    let result = {
        let mut ctx = ExecutionContext::from_snapshot(&mut snapshot, data.timestamp);
        let result = execute_instruction(&si, caller, &mut ctx);
        (result, ctx.take_events())
    };

    match result {
        (Err(_), events) => {
            assert!(events.is_empty());
            assert_eq!(snapshot, before, "failed instruction changed state");
        }
        (Ok(()), _) => {
            assert!(snapshot.state.check_invariants().is_ok());
            assert_eq!(held(&snapshot), held(&before), "tokens created or destroyed");
        }
    }
});

fn held(snapshot: &LedgerSnapshot) -> u128 {
    let custody = &snapshot.custody;
    custody.custody + custody.burned + custody.balances.values().sum::<u128>()
}
