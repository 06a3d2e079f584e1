use anyhow::{anyhow, bail, Result};
use clap::Parser;
use idstake_crypto::signatures::{address_of, sign_transaction, SigningKey};
use idstake_execution::{execute_transaction, ExecutionContext};
use idstake_genesis::{create_genesis_state, GenesisBalance, GenesisConfig};
use idstake_types::instruction::StakingInstruction;
use idstake_types::params::{
    format_units, MAX_LOCK_DURATION, MIN_LOCK_DURATION, SECONDS_PER_DAY, SECONDS_PER_WEEK, UNIT,
};
use idstake_types::state::LedgerSnapshot;
use idstake_types::transaction::Transaction;
use idstake_types::{format_address, Address};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::Instant;

const START_TIME: u64 = 1_700_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "IdStake randomized staking and slashing simulation")]
struct Args {
    /// Number of wallets created for the simulation. Wallet 0 operates slashes and releases.
    #[arg(long, default_value_t = 50)]
    wallets: usize,
    /// Number of random operations to execute.
    #[arg(long, default_value_t = 5_000)]
    steps: usize,
    /// Starting whole-token balance airdropped to each wallet.
    #[arg(long, default_value_t = 10_000)]
    balance: u64,
    /// Largest slash percentage the operator uses.
    #[arg(long, default_value_t = 50)]
    max_percent: u64,
    #[arg(long)]
    seed: Option<u64>,
}

struct SimWallet {
    keypair: SigningKey,
    address: Address,
}

#[derive(Default, Debug)]
struct Report {
    /// Per instruction name: (applied, rejected).
    outcomes: BTreeMap<&'static str, (u64, u64)>,
    deposited: u128,
}

impl Report {
    fn record(&mut self, name: &'static str, applied: bool) {
        let entry = self.outcomes.entry(name).or_default();
        if applied {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    fn applied(&self) -> u64 {
        self.outcomes.values().map(|(ok, _)| ok).sum()
    }
}

fn build_wallets(rng: &mut StdRng, count: usize) -> Vec<SimWallet> {
    (0..count)
        .map(|_| {
            let keypair = SigningKey::from_bytes(&rng.gen::<[u8; 32]>());
            let address = address_of(&keypair);
            SimWallet { keypair, address }
        })
        .collect()
}

fn genesis(wallets: &[SimWallet], balance: u64) -> Result<LedgerSnapshot> {
    let operator = wallets.first().ok_or_else(|| anyhow!("need at least one wallet"))?;
    let mut config = GenesisConfig::dev(&operator.address, START_TIME);
    config.balances = wallets
        .iter()
        .map(|wallet| GenesisBalance {
            account: format_address(&wallet.address),
            amount: balance.to_string(),
        })
        .collect();
    create_genesis_state(&config)
}

fn random_duration(rng: &mut StdRng) -> u64 {
    rng.gen_range(MIN_LOCK_DURATION / SECONDS_PER_WEEK..=MAX_LOCK_DURATION / SECONDS_PER_WEEK)
        * SECONDS_PER_WEEK
}

fn pick<'a>(rng: &mut StdRng, wallets: &'a [SimWallet]) -> &'a SimWallet {
    &wallets[rng.gen_range(0..wallets.len())]
}

/// Chooses the next operation against the current snapshot. Targets are drawn from live
/// positions so most operations have something to act on.
fn next_operation<'a>(
    rng: &mut StdRng,
    wallets: &'a [SimWallet],
    snapshot: &LedgerSnapshot,
    max_percent: u64,
) -> (&'a SimWallet, StakingInstruction) {
    let state = &snapshot.state;
    let operator = &wallets[0];
    let wallet = pick(rng, wallets);
    let stake_amount = |rng: &mut StdRng| rng.gen_range(1..=100) * UNIT;

    match rng.gen_range(0..10) {
        0 | 1 => (
            wallet,
            StakingInstruction::SelfStake {
                amount: stake_amount(rng),
                duration: random_duration(rng),
            },
        ),
        2 => (
            wallet,
            StakingInstruction::CommunityStake {
                stakee: pick(rng, wallets).address,
                amount: stake_amount(rng),
                duration: random_duration(rng),
            },
        ),
        3 => (
            wallet,
            StakingInstruction::ExtendSelfStake {
                duration: random_duration(rng),
            },
        ),
        4 => {
            let available = state.self_stake(&wallet.address).amount;
            (
                wallet,
                StakingInstruction::WithdrawSelfStake {
                    amount: rng.gen_range(0..=available),
                },
            )
        }
        5 => {
            let stakee = pick(rng, wallets).address;
            let available = state.community_stake(&wallet.address, &stakee).amount;
            (
                wallet,
                StakingInstruction::WithdrawCommunityStake {
                    stakee,
                    amount: rng.gen_range(0..=available),
                },
            )
        }
        6 | 7 => {
            let self_stakers = (0..rng.gen_range(0..=3))
                .map(|_| pick(rng, wallets).address)
                .collect();
            let pairs: Vec<(Address, Address)> = state.community_stakes.keys().copied().collect();
            let (community_stakers, community_stakees): (Vec<Address>, Vec<Address>) =
                if pairs.is_empty() {
                    (Vec::new(), Vec::new())
                } else {
                    (0..rng.gen_range(0..=2))
                        .map(|_| pairs[rng.gen_range(0..pairs.len())])
                        .unzip()
                };
            (
                operator,
                StakingInstruction::Slash {
                    self_stakers,
                    community_stakers,
                    community_stakees,
                    percent: rng.gen_range(1..=max_percent.clamp(1, 100)),
                },
            )
        }
        8 => {
            let earliest = state.clock.round_to_burn();
            let slashed: Vec<_> = state
                .self_stakes
                .iter()
                .map(|(staker, stake)| (*staker, *staker, *stake))
                .chain(
                    state
                        .community_stakes
                        .iter()
                        .map(|((staker, stakee), stake)| (*staker, *stakee, *stake)),
                )
                .filter(|(_, _, stake)| {
                    stake.slashed_amount > 0 && stake.slashed_in_round >= earliest
                })
                .collect();
            match slashed.get(rng.gen_range(0..slashed.len().max(1))) {
                Some((staker, stakee, stake)) => (
                    operator,
                    StakingInstruction::Release {
                        staker: *staker,
                        stakee: *stakee,
                        amount: rng.gen_range(1..=stake.slashed_amount),
                        slash_round: stake.slashed_in_round,
                    },
                ),
                None => (operator, StakingInstruction::AdvanceRound),
            }
        }
        _ => (wallet, StakingInstruction::AdvanceRound),
    }
}

fn build_tx(wallet: &SimWallet, nonce: u64, instruction: StakingInstruction) -> Transaction {
    let mut tx = Transaction {
        sender: wallet.address,
        nonce,
        instruction,
        signature: vec![],
    };
    sign_transaction(&wallet.keypair, &mut tx);
    tx
}

fn check_step(snapshot: &LedgerSnapshot, deposited: u128, step: usize) -> Result<()> {
    if let Err(e) = snapshot.state.check_invariants() {
        bail!("step {}: {}", step, e);
    }
    let custody = &snapshot.custody;
    let held = custody
        .balances
        .values()
        .try_fold(custody.custody, |acc, b| acc.checked_add(*b))
        .and_then(|sum| sum.checked_add(custody.burned))
        .ok_or_else(|| anyhow!("step {}: token supply overflow", step))?;
    if held != deposited {
        bail!("step {}: tokens not conserved ({} != {})", step, held, deposited);
    }
    Ok(())
}

fn run_simulation(args: &Args) -> Result<(Report, LedgerSnapshot)> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let wallets = build_wallets(&mut rng, args.wallets);
    let mut snapshot = genesis(&wallets, args.balance)?;
    let mut report = Report {
        deposited: snapshot.custody.balances.values().sum(),
        ..Default::default()
    };
    let mut now = START_TIME;

    for step in 0..args.steps {
        // Mostly small gaps, with the occasional multi-week jump so rounds close.
        now += if rng.gen_ratio(1, 20) {
            rng.gen_range(1..=30) * SECONDS_PER_DAY
        } else {
            rng.gen_range(1..=3_600)
        };

        let (wallet, instruction) = next_operation(&mut rng, &wallets, &snapshot, args.max_percent);
        let name = instruction.name();
        let tx = build_tx(wallet, snapshot.state.nonce(&wallet.address), instruction);

        let result = {
            let mut ctx = ExecutionContext::from_snapshot(&mut snapshot, now);
            execute_transaction(&tx, &mut ctx)
        };
        report.record(name, result.is_ok());
        check_step(&snapshot, report.deposited, step)?;
    }

    Ok((report, snapshot))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let start = Instant::now();
    let (report, snapshot) = run_simulation(&args)?;
    let elapsed = start.elapsed();

    println!("=== IdStake Simulation ===");
    println!("Wallets: {}", args.wallets);
    println!("Steps: {} ({} applied)", args.steps, report.applied());
    for (name, (applied, rejected)) in &report.outcomes {
        println!("  {:<26} applied {:>6}  rejected {:>6}", name, applied, rejected);
    }
    println!("Elapsed: {:.2?}", elapsed);
    println!("Current round: {}", snapshot.state.clock.current_round);
    println!("In custody: {}", format_units(snapshot.custody.custody));
    println!("Burned: {}", format_units(snapshot.custody.burned));
    println!("Root: {}", hex::encode(snapshot.state.root_hash()));
    println!("Invariants held after every step.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(seed: u64) -> Args {
        Args {
            wallets: 8,
            steps: 1_500,
            balance: 1_000,
            max_percent: 60,
            seed: Some(seed),
        }
    }

    #[test]
    fn simulation_bootstraps_wallets_and_money() {
        let mut rng = StdRng::seed_from_u64(1);
        let wallets = build_wallets(&mut rng, 4);
        let snapshot = genesis(&wallets, 1_000).unwrap();

        assert_eq!(snapshot.custody.balances.len(), 4);
        assert_eq!(snapshot.custody.balance_of(&wallets[3].address), 1_000 * UNIT);
        assert_eq!(snapshot.state.clock.current_round, 1);
    }

    #[test]
    fn randomized_run_keeps_invariants() {
        for seed in [7, 42] {
            let (report, snapshot) = run_simulation(&args(seed)).unwrap();
            assert!(report.applied() > 0);
            assert!(report.outcomes.get("self_stake").map_or(0, |o| o.0) > 0);
            assert!(snapshot.state.clock.current_round > 1);
        }
    }

    #[test]
    fn same_seed_same_ledger() {
        let (_, a) = run_simulation(&args(9)).unwrap();
        let (_, b) = run_simulation(&args(9)).unwrap();
        assert_eq!(a.state.root_hash(), b.state.root_hash());
    }
}
