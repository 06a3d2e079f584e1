#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use idstake_execution::{execute_instruction, ExecutionContext};
use idstake_types::access::{Capability, RoleRegistry};
use idstake_types::instruction::StakingInstruction;
use idstake_types::params::{DEFAULT_ROUND_DURATION, MIN_LOCK_DURATION};
use idstake_types::state::LedgerSnapshot;

const OPERATOR: [u8; 32] = [9u8; 32];
const STAKERS: [[u8; 32]; 3] = [[1u8; 32], [2u8; 32], [3u8; 32]];

#[derive(Arbitrary, Debug)]
enum Step {
    Stake { who: u8, amount: u64 },
    Slash { targets: u8, percent: u8 },
    Release { who: u8, amount: u64, round_back: u8 },
    Advance { days: u8 },
}

fuzz_target!(|steps: Vec<Step>| {
    let mut snapshot = LedgerSnapshot::default();
    let mut roles = RoleRegistry::new(OPERATOR);
    for capability in [Capability::Slash, Capability::Release] {
        let _ = roles.grant(&OPERATOR, capability, OPERATOR);
    }
    snapshot.roles = roles;
    for staker in STAKERS {
        let _ = snapshot.custody.credit(staker, u128::from(u64::MAX) * 64);
    }

    let mut now = 0u64;
    for step in steps.iter().take(64) {
        let (caller, si) = match step {
            Step::Stake { who, amount } => (
                STAKERS[usize::from(*who) % 3],
                StakingInstruction::SelfStake {
                    amount: u128::from(*amount),
                    duration: MIN_LOCK_DURATION,
                },
            ),
            Step::Slash { targets, percent } => (
                OPERATOR,
                StakingInstruction::Slash {
                    self_stakers: STAKERS
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| targets & (1 << i) != 0)
                        .map(|(_, s)| *s)
                        .collect(),
                    community_stakers: vec![],
                    community_stakees: vec![],
                    percent: u64::from(*percent),
                },
            ),
            Step::Release {
                who,
                amount,
                round_back,
            } => {
                let staker = STAKERS[usize::from(*who) % 3];
                (
                    OPERATOR,
                    StakingInstruction::Release {
                        staker,
                        stakee: staker,
                        amount: u128::from(*amount),
                        slash_round: snapshot
                            .state
                            .clock
                            .current_round
                            .saturating_sub(u64::from(*round_back % 3)),
                    },
                )
            }
            Step::Advance { days } => {
                now += u64::from(*days) * 86_400;
                (OPERATOR, StakingInstruction::AdvanceRound)
            }
        };

        let before = snapshot.clone();
        let pending_before: u128 = before.state.slashed_per_round.values().sum();
        let result = {
            let mut ctx = ExecutionContext::from_snapshot(&mut snapshot, now);
            execute_instruction(&si, &caller, &mut ctx)
        };

        if result.is_err() {
            assert_eq!(snapshot, before);
            continue;
        }
        assert!(snapshot.state.check_invariants().is_ok());

        let staked_before: u128 = before.state.total_staked.values().sum();
        let staked: u128 = snapshot.state.total_staked.values().sum();
        let pending: u128 = snapshot.state.slashed_per_round.values().sum();
        match si {
            // Slashing moves value from live stake into the buckets.
            StakingInstruction::Slash { .. } => {
                assert_eq!(staked_before - staked, pending - pending_before)
            }
            StakingInstruction::Release { amount, .. } => {
                assert_eq!(staked - staked_before, amount);
                assert_eq!(pending_before - pending, amount);
            }
            StakingInstruction::AdvanceRound => {
                assert!(now >= before.state.clock.last_advance_time + DEFAULT_ROUND_DURATION);
                assert_eq!(
                    snapshot.state.clock.current_round,
                    before.state.clock.current_round + 1
                );
            }
            _ => {}
        }
    }
});
