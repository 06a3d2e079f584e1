//! Randomized operation sequences checked against the ledger invariants.

use idstake_execution::{execute_instruction, ExecutionContext};
use idstake_types::access::{Capability, RoleRegistry};
use idstake_types::params::{DEFAULT_ROUND_DURATION, MAX_LOCK_DURATION, MIN_LOCK_DURATION};
use idstake_types::state::{LedgerSnapshot, LedgerState};
use idstake_types::{Address, StakeKey, StakingEvent, StakingInstruction};
use proptest::prelude::*;

const T0: u64 = 1_000_000;
const ADMIN: Address = [200u8; 32];
const OPERATOR: Address = [201u8; 32];

fn account(i: u8) -> Address {
    [i % 4 + 1; 32]
}

#[derive(Debug, Clone)]
enum Op {
    Stake { who: u8, on: u8, amount: u128, duration: u64 },
    Extend { who: u8, on: u8, duration: u64 },
    Withdraw { who: u8, on: u8, amount: u128 },
    Slash { who: u8, on: u8, percent: u64 },
    Release { who: u8, on: u8, amount: u128, back: u64 },
    Wait { secs: u64 },
    Advance,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<u8>(), any::<u8>(), 1..1_000_000u128, MIN_LOCK_DURATION..=MAX_LOCK_DURATION)
            .prop_map(|(who, on, amount, duration)| Op::Stake { who, on, amount, duration }),
        (any::<u8>(), any::<u8>(), 0..MAX_LOCK_DURATION + 1_000)
            .prop_map(|(who, on, duration)| Op::Extend { who, on, duration }),
        (any::<u8>(), any::<u8>(), 0..1_000_000u128)
            .prop_map(|(who, on, amount)| Op::Withdraw { who, on, amount }),
        (any::<u8>(), any::<u8>(), 0..=120u64)
            .prop_map(|(who, on, percent)| Op::Slash { who, on, percent }),
        (any::<u8>(), any::<u8>(), 0..500_000u128, 0..3u64)
            .prop_map(|(who, on, amount, back)| Op::Release { who, on, amount, back }),
        (0..DEFAULT_ROUND_DURATION).prop_map(|secs| Op::Wait { secs }),
        Just(Op::Advance),
    ]
}

fn instruction(op: &Op, round: u64) -> (Address, StakingInstruction) {
    match op.clone() {
        Op::Stake { who, on, amount, duration } => {
            let (who, on) = (account(who), account(on));
            let si = if who == on {
                StakingInstruction::SelfStake { amount, duration }
            } else {
                StakingInstruction::CommunityStake { stakee: on, amount, duration }
            };
            (who, si)
        }
        Op::Extend { who, on, duration } => {
            let (who, on) = (account(who), account(on));
            let si = if who == on {
                StakingInstruction::ExtendSelfStake { duration }
            } else {
                StakingInstruction::ExtendCommunityStake { stakee: on, duration }
            };
            (who, si)
        }
        Op::Withdraw { who, on, amount } => {
            let (who, on) = (account(who), account(on));
            let si = if who == on {
                StakingInstruction::WithdrawSelfStake { amount }
            } else {
                StakingInstruction::WithdrawCommunityStake { stakee: on, amount }
            };
            (who, si)
        }
        Op::Slash { who, on, percent } => {
            let (who, on) = (account(who), account(on));
            let si = if who == on {
                StakingInstruction::Slash {
                    self_stakers: vec![who],
                    community_stakers: vec![],
                    community_stakees: vec![],
                    percent,
                }
            } else {
                StakingInstruction::Slash {
                    self_stakers: vec![],
                    community_stakers: vec![who],
                    community_stakees: vec![on],
                    percent,
                }
            };
            (OPERATOR, si)
        }
        Op::Release { who, on, amount, back } => (
            OPERATOR,
            StakingInstruction::Release {
                staker: account(who),
                stakee: account(on),
                amount,
                slash_round: round.saturating_sub(back),
            },
        ),
        Op::Wait { .. } | Op::Advance => (OPERATOR, StakingInstruction::AdvanceRound),
    }
}

fn snapshot() -> LedgerSnapshot {
    let mut roles = RoleRegistry::new(ADMIN);
    roles.grant(&ADMIN, Capability::Slash, OPERATOR).unwrap();
    roles.grant(&ADMIN, Capability::Release, OPERATOR).unwrap();
    let mut snapshot = LedgerSnapshot {
        state: LedgerState::new(T0, DEFAULT_ROUND_DURATION),
        roles,
        ..Default::default()
    };
    for i in 0..4u8 {
        snapshot.custody.credit(account(i), u128::from(u64::MAX));
    }
    snapshot
}

proptest! {
    #[test]
    fn ledger_invariants_hold(ops in prop::collection::vec(op(), 1..80)) {
        let mut snapshot = snapshot();
        let mut now = T0;
        let deposited: u128 = 4 * u128::from(u64::MAX);

        for op in &ops {
            if let Op::Wait { secs } = op {
                now += secs;
                continue;
            }
            if let Op::Advance = op {
                now += DEFAULT_ROUND_DURATION;
            }

            let before = snapshot.clone();
            let (sender, si) = instruction(op, before.state.clock.current_round);
            let mut ctx = ExecutionContext::from_snapshot(&mut snapshot, now);
            let result = execute_instruction(&si, &sender, &mut ctx);
            let events = ctx.take_events();

            match result {
                Err(_) => {
                    prop_assert!(events.is_empty());
                    prop_assert_eq!(&snapshot, &before);
                }
                Ok(()) => {
                    for event in &events {
                        if let StakingEvent::Slash { round, .. } = event {
                            prop_assert_eq!(*round, before.state.clock.current_round);
                        }
                    }
                    if let StakingInstruction::Slash { .. } = si {
                        let round = before.state.clock.current_round;
                        let added: u128 = events.iter().map(|e| match e {
                            StakingEvent::Slash { amount, .. } => *amount,
                            _ => 0,
                        }).sum();
                        let key = match &op {
                            Op::Slash { who, on, .. } => StakeKey::for_pair(account(*who), account(*on)),
                            _ => unreachable!(),
                        };
                        let (was, is) = (before.state.stake(&key), snapshot.state.stake(&key));
                        prop_assert_eq!(was.amount, is.amount + added);
                        if was.slashed_in_round + 1 == round {
                            prop_assert_eq!(
                                snapshot.state.pending_burn(round),
                                before.state.pending_burn(round) + was.slashed_amount + added
                            );
                        } else if was.slashed_in_round == round {
                            prop_assert_eq!(
                                snapshot.state.pending_burn(round),
                                before.state.pending_burn(round) + added
                            );
                        }
                    }
                }
            }

            for (staker, stake) in &snapshot.state.self_stakes {
                let old = before.state.self_stake(staker);
                prop_assert!(stake.unlock_time >= old.unlock_time);
            }
            for (pair, stake) in &snapshot.state.community_stakes {
                let old = before.state.community_stake(&pair.0, &pair.1);
                prop_assert!(stake.unlock_time >= old.unlock_time);
            }
            prop_assert!(snapshot.state.check_invariants().is_ok());

            let custody = &snapshot.custody;
            let held: u128 = custody.balances.values().sum();
            prop_assert_eq!(held + custody.custody + custody.burned, deposited);
        }
    }
}
