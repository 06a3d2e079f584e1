use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use idstake_api::{account_view, round_view, AccountView, Receipt, Rejection, RoundView};
use idstake_crypto::signatures::{address_of, generate_keypair, sign_transaction, SigningKey};
use idstake_execution::{execute_transaction, ExecutionContext};
use idstake_genesis::{create_genesis_state, GenesisBalance, GenesisConfig};
use idstake_storage::StateStore;
use idstake_types::access::Capability;
use idstake_types::instruction::StakingInstruction;
use idstake_types::params::{format_units, parse_units, SECONDS_PER_WEEK};
use idstake_types::transaction::Transaction;
use idstake_types::{format_address, parse_address, Address, StakingEvent};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "IdStake CLI: operate an identity staking ledger locally or through a node"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,
    #[arg(short, long, default_value = "wallet.json")]
    wallet_path: PathBuf,
    /// Submit to a running node instead of the local data directory.
    #[arg(short, long)]
    node_url: Option<String>,
    /// Unix timestamp local operations execute at. Defaults to the system clock.
    #[arg(long)]
    at: Option<u64>,
    #[arg(long, default_value = "warn")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet
    Keygen,
    /// Create a ledger in the data directory
    Init {
        /// Genesis JSON. Without it the wallet becomes admin and holds every capability.
        #[arg(long)]
        genesis: Option<PathBuf>,
        /// Tokens credited to the wallet in a development genesis.
        #[arg(long, default_value = "0")]
        fund: String,
    },
    /// Stake tokens on your own identity
    SelfStake {
        #[arg(long)]
        amount: String,
        #[arg(long)]
        weeks: u64,
    },
    /// Re-lock your self-stake
    ExtendSelfStake {
        #[arg(long)]
        weeks: u64,
    },
    /// Withdraw unlocked self-stake
    WithdrawSelfStake {
        #[arg(long)]
        amount: String,
    },
    /// Stake tokens on another identity
    CommunityStake {
        #[arg(long)]
        stakee: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        weeks: u64,
    },
    /// Re-lock a community stake
    ExtendCommunityStake {
        #[arg(long)]
        stakee: String,
        #[arg(long)]
        weeks: u64,
    },
    /// Withdraw an unlocked community stake
    WithdrawCommunityStake {
        #[arg(long)]
        stakee: String,
        #[arg(long)]
        amount: String,
    },
    /// Slash a batch of positions by a percentage
    Slash {
        #[arg(long = "self-staker")]
        self_stakers: Vec<String>,
        /// Community position as STAKER:STAKEE
        #[arg(long = "community")]
        community: Vec<String>,
        #[arg(long)]
        percent: u64,
    },
    /// Return slashed tokens that have not been burned yet
    Release {
        #[arg(long)]
        staker: String,
        /// Defaults to the staker, releasing from the self-stake.
        #[arg(long)]
        stakee: Option<String>,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        round: u64,
    },
    /// Burn the previous round and open the next one
    AdvanceRound,
    /// Halt every ledger operation
    Pause,
    /// Resume ledger operations
    Unpause,
    /// Give an account a capability (admin only): slash, release or pause
    Grant {
        capability: Capability,
        #[arg(long)]
        account: String,
    },
    /// Take a capability away from an account (admin only)
    Revoke {
        capability: Capability,
        #[arg(long)]
        account: String,
    },
    /// Show an account's positions (defaults to the wallet)
    Show {
        #[arg(long)]
        address: Option<String>,
    },
    /// Show the round clock and unburned buckets
    Rounds,
}

#[derive(Serialize, Deserialize)]
struct Wallet {
    secret_key: String,
    public_key: String,
}

impl Wallet {
    fn generate() -> Self {
        let kp = generate_keypair();
        Self {
            secret_key: hex::encode(kp.to_bytes()),
            public_key: hex::encode(kp.verifying_key().as_bytes()),
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("No wallet at {:?}; run `keygen` first", path))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn to_keypair(&self) -> Result<SigningKey> {
        let secret = hex::decode(&self.secret_key)?;
        Ok(SigningKey::from_bytes(secret.as_slice().try_into()?))
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn address(s: &str) -> Result<Address> {
    parse_address(s).map_err(|e| anyhow!("Invalid address {:?}: {}", s, e))
}

fn amount(s: &str) -> Result<u128> {
    parse_units(s).ok_or_else(|| anyhow!("Invalid amount {:?}", s))
}

fn weeks(n: u64) -> Result<u64> {
    n.checked_mul(SECONDS_PER_WEEK)
        .ok_or_else(|| anyhow!("{} weeks is out of range", n))
}

fn parse_pair(s: &str) -> Result<(Address, Address)> {
    let (staker, stakee) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("Expected STAKER:STAKEE, got {:?}", s))?;
    Ok((address(staker)?, address(stakee)?))
}

/// The ledger instruction a command submits, if it submits one.
fn instruction_for(command: &Commands) -> Result<Option<StakingInstruction>> {
    let si = match command {
        Commands::SelfStake {
            amount: a,
            weeks: w,
        } => StakingInstruction::SelfStake {
            amount: amount(a)?,
            duration: weeks(*w)?,
        },
        Commands::ExtendSelfStake { weeks: w } => StakingInstruction::ExtendSelfStake {
            duration: weeks(*w)?,
        },
        Commands::WithdrawSelfStake { amount: a } => {
            StakingInstruction::WithdrawSelfStake { amount: amount(a)? }
        }
        Commands::CommunityStake {
            stakee,
            amount: a,
            weeks: w,
        } => StakingInstruction::CommunityStake {
            stakee: address(stakee)?,
            amount: amount(a)?,
            duration: weeks(*w)?,
        },
        Commands::ExtendCommunityStake { stakee, weeks: w } => {
            StakingInstruction::ExtendCommunityStake {
                stakee: address(stakee)?,
                duration: weeks(*w)?,
            }
        }
        Commands::WithdrawCommunityStake { stakee, amount: a } => {
            StakingInstruction::WithdrawCommunityStake {
                stakee: address(stakee)?,
                amount: amount(a)?,
            }
        }
        Commands::Slash {
            self_stakers,
            community,
            percent,
        } => {
            let (community_stakers, community_stakees): (Vec<Address>, Vec<Address>) = community
                .iter()
                .map(|pair| parse_pair(pair))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .unzip();
            StakingInstruction::Slash {
                self_stakers: self_stakers
                    .iter()
                    .map(|s| address(s))
                    .collect::<Result<_>>()?,
                community_stakers,
                community_stakees,
                percent: *percent,
            }
        }
        Commands::Release {
            staker,
            stakee,
            amount: a,
            round,
        } => {
            let staker = address(staker)?;
            StakingInstruction::Release {
                staker,
                stakee: match stakee {
                    Some(s) => address(s)?,
                    None => staker,
                },
                amount: amount(a)?,
                slash_round: *round,
            }
        }
        Commands::AdvanceRound => StakingInstruction::AdvanceRound,
        Commands::Pause => StakingInstruction::Pause,
        Commands::Unpause => StakingInstruction::Unpause,
        Commands::Grant {
            capability,
            account,
        } => StakingInstruction::GrantCapability {
            capability: *capability,
            account: address(account)?,
        },
        Commands::Revoke {
            capability,
            account,
        } => StakingInstruction::RevokeCapability {
            capability: *capability,
            account: address(account)?,
        },
        Commands::Keygen | Commands::Init { .. } | Commands::Show { .. } | Commands::Rounds => {
            return Ok(None)
        }
    };
    Ok(Some(si))
}

fn signed(key: &SigningKey, nonce: u64, instruction: StakingInstruction) -> Transaction {
    let mut tx = Transaction {
        sender: address_of(key),
        nonce,
        instruction,
        signature: vec![],
    };
    sign_transaction(key, &mut tx);
    tx
}

fn init_ledger(
    store: &dyn StateStore,
    admin: &Address,
    genesis: Option<&Path>,
    fund: u128,
    deployed_at: u64,
) -> Result<()> {
    if store.load_snapshot()?.is_some() {
        bail!("A ledger already exists in this data directory");
    }
    let config = match genesis {
        Some(path) => GenesisConfig::load(path)?,
        None => {
            let mut config = GenesisConfig::dev(admin, deployed_at);
            if fund > 0 {
                config.balances.push(GenesisBalance {
                    account: format_address(admin),
                    amount: format_units(fund),
                });
            }
            config
        }
    };
    store.save_snapshot(&create_genesis_state(&config)?)
}

fn apply_local(
    store: &dyn StateStore,
    key: &SigningKey,
    instruction: StakingInstruction,
    now: u64,
) -> Result<Vec<StakingEvent>> {
    let mut snapshot = store
        .load_snapshot()?
        .ok_or_else(|| anyhow!("No ledger found; run `init` first"))?;
    let tx = signed(key, snapshot.state.nonce(&address_of(key)), instruction);
    debug!(tx = %hex::encode(tx.id()), nonce = tx.nonce, "executing locally");

    let events = {
        let mut ctx = ExecutionContext::from_snapshot(&mut snapshot, now);
        execute_transaction(&tx, &mut ctx)
            .map_err(|e| anyhow!("{} rejected: {}", tx.instruction.name(), e))?;
        ctx.take_events()
    };
    store.save_snapshot(&snapshot)?;
    Ok(events)
}

async fn submit_remote(
    client: &Client,
    node_url: &str,
    key: &SigningKey,
    instruction: StakingInstruction,
) -> Result<Receipt> {
    let sender = format_address(&address_of(key));
    let nonce: u64 = client
        .get(format!("{}/nonce/{}", node_url, sender))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let tx = signed(key, nonce, instruction);

    let res = client
        .post(format!("{}/tx", node_url))
        .json(&tx)
        .send()
        .await?;
    if res.status().is_success() {
        return Ok(res.json().await?);
    }
    let status = res.status();
    match res.json::<Rejection>().await {
        Ok(rejection) => bail!(
            "{} rejected ({}): {}",
            tx.instruction.name(),
            rejection.kind,
            rejection.message
        ),
        Err(_) => bail!("Node answered {}", status),
    }
}

fn print_account(view: &AccountView) {
    println!("Account: {}", view.address);
    println!("Nonce: {}", view.nonce);
    println!("Total staked: {}", format_units(view.total_staked));
    let own = &view.self_stake;
    println!(
        "Self-stake: {} (unlocks at {}), slashed {} in round {}",
        format_units(own.amount),
        own.unlock_time,
        format_units(own.slashed_amount),
        own.slashed_in_round
    );
    for (stakee, stake) in &view.community {
        println!(
            "  -> {}: {} (unlocks at {}), slashed {} in round {}",
            stakee,
            format_units(stake.amount),
            stake.unlock_time,
            format_units(stake.slashed_amount),
            stake.slashed_in_round
        );
    }
    for (staker, stake) in &view.backers {
        println!(
            "  <- {}: {} (unlocks at {})",
            staker,
            format_units(stake.amount),
            stake.unlock_time
        );
    }
}

fn print_rounds(view: &RoundView) {
    println!("Current round: {}", view.current_round);
    println!("Last advance: {}", view.last_advance_time);
    println!("Next advance at: {}", view.next_advance_at);
    if view.paused {
        println!("Ledger is PAUSED");
    }
    for (round, amount) in &view.pending {
        let note = if *round == view.round_to_burn {
            " (burns at next advance)"
        } else {
            ""
        };
        println!("  round {}: {} pending{}", round, format_units(*amount), note);
    }
}

fn open_store(data_dir: &Path) -> Result<Box<dyn StateStore>> {
    idstake_storage::open(data_dir).context("Failed to open data directory")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    let client = Client::new();
    let timestamp = cli.at.unwrap_or_else(now);

    if let Some(instruction) = instruction_for(&cli.command)? {
        let key = Wallet::load(&cli.wallet_path)?.to_keypair()?;
        let events = match &cli.node_url {
            Some(url) => {
                let receipt = submit_remote(&client, url, &key, instruction).await?;
                println!("Transaction {}", receipt.tx_id);
                println!("Ledger root: {}", receipt.root_hash);
                receipt.events
            }
            None => {
                let store = open_store(&cli.data_dir)?;
                apply_local(store.as_ref(), &key, instruction, timestamp)?
            }
        };
        for event in &events {
            println!("{}", event);
        }
        return Ok(());
    }

    match &cli.command {
        Commands::Keygen => {
            if cli.wallet_path.exists() {
                bail!("Wallet {:?} already exists", cli.wallet_path);
            }
            let wallet = Wallet::generate();
            wallet.save(&cli.wallet_path)?;
            println!("Wallet initialized at {:?}", cli.wallet_path);
            println!("Address: 0x{}", wallet.public_key);
        }
        Commands::Init { genesis, fund } => {
            let admin = address_of(&Wallet::load(&cli.wallet_path)?.to_keypair()?);
            let store = open_store(&cli.data_dir)?;
            init_ledger(store.as_ref(), &admin, genesis.as_deref(), amount(fund)?, timestamp)?;
            println!("Ledger created in {:?}", cli.data_dir);
        }
        Commands::Show { address: account } => {
            let account = match account {
                Some(s) => address(s)?,
                None => address_of(&Wallet::load(&cli.wallet_path)?.to_keypair()?),
            };
            let view: AccountView = match &cli.node_url {
                Some(url) => {
                    client
                        .get(format!("{}/stake/{}", url, format_address(&account)))
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?
                }
                None => {
                    let snapshot = open_store(&cli.data_dir)?
                        .load_snapshot()?
                        .ok_or_else(|| anyhow!("No ledger found; run `init` first"))?;
                    account_view(&snapshot, &account)
                }
            };
            print_account(&view);
        }
        Commands::Rounds => {
            let view: RoundView = match &cli.node_url {
                Some(url) => {
                    client
                        .get(format!("{}/round", url))
                        .send()
                        .await?
                        .error_for_status()?
                        .json()
                        .await?
                }
                None => {
                    let snapshot = open_store(&cli.data_dir)?
                        .load_snapshot()?
                        .ok_or_else(|| anyhow!("No ledger found; run `init` first"))?;
                    round_view(&snapshot)
                }
            };
            print_rounds(&view);
        }
        _ => unreachable!("ledger instructions are handled above"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_storage::FileStore;
    use idstake_types::params::{DEFAULT_ROUND_DURATION, UNIT};

    const T0: u64 = 1_700_000_000;

    #[test]
    fn wallet_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let wallet = Wallet::generate();
        wallet.save(&path).unwrap();

        let key = Wallet::load(&path).unwrap().to_keypair().unwrap();
        assert_eq!(hex::encode(address_of(&key)), wallet.public_key);
    }

    #[test]
    fn community_pairs_parse() {
        let staker = format_address(&[1u8; 32]);
        let stakee = format_address(&[2u8; 32]);
        let pair = parse_pair(&format!("{}:{}", staker, stakee)).unwrap();
        assert_eq!(pair, ([1u8; 32], [2u8; 32]));
        assert!(parse_pair(&staker).is_err());
    }

    #[test]
    fn commands_map_to_instructions() {
        let cmd = Commands::SelfStake {
            amount: "1.5".into(),
            weeks: 12,
        };
        assert_eq!(
            instruction_for(&cmd).unwrap(),
            Some(StakingInstruction::SelfStake {
                amount: 3 * UNIT / 2,
                duration: 12 * SECONDS_PER_WEEK,
            })
        );

        let cmd = Commands::Release {
            staker: format_address(&[4u8; 32]),
            stakee: None,
            amount: "2".into(),
            round: 3,
        };
        assert_eq!(
            instruction_for(&cmd).unwrap(),
            Some(StakingInstruction::Release {
                staker: [4u8; 32],
                stakee: [4u8; 32],
                amount: 2 * UNIT,
                slash_round: 3,
            })
        );

        assert!(instruction_for(&Commands::Rounds).unwrap().is_none());
        assert!(instruction_for(&Commands::WithdrawSelfStake {
            amount: "lots".into()
        })
        .is_err());
    }

    #[test]
    fn local_ledger_stake_slash_and_burn() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = generate_keypair();
        let me = address_of(&key);

        init_ledger(&store, &me, None, 100 * UNIT, T0).unwrap();
        assert!(init_ledger(&store, &me, None, 0, T0).is_err());

        let stake = StakingInstruction::SelfStake {
            amount: 10 * UNIT,
            duration: 12 * SECONDS_PER_WEEK,
        };
        let events = apply_local(&store, &key, stake, T0).unwrap();
        assert_eq!(events.len(), 1);

        let slash = StakingInstruction::Slash {
            self_stakers: vec![me],
            community_stakers: vec![],
            community_stakees: vec![],
            percent: 50,
        };
        apply_local(&store, &key, slash, T0 + 1).unwrap();

        // Round 1 closes, then round 2 closes and burns round 1's bucket.
        apply_local(&store, &key, StakingInstruction::AdvanceRound, T0 + DEFAULT_ROUND_DURATION)
            .unwrap();
        let events = apply_local(
            &store,
            &key,
            StakingInstruction::AdvanceRound,
            T0 + 2 * DEFAULT_ROUND_DURATION,
        )
        .unwrap();
        assert!(matches!(
            events.as_slice(),
            [StakingEvent::Burn { round: 1, amount }] if *amount == 5 * UNIT
        ));

        let snapshot = store.load_snapshot().unwrap().unwrap();
        let view = account_view(&snapshot, &me);
        assert_eq!(view.total_staked, 5 * UNIT);
        assert_eq!(view.nonce, 4);
        assert_eq!(snapshot.custody.burned, 5 * UNIT);
    }

    #[test]
    fn grant_and_revoke_parse_capability_names() {
        let account = format_address(&[5u8; 32]);
        let parse = |command: &str, capability: &str| {
            Cli::try_parse_from(["idstake-cli", command, capability, "--account", account.as_str()])
        };

        let cli = parse("grant", "slasher").unwrap();
        assert_eq!(
            instruction_for(&cli.command).unwrap(),
            Some(StakingInstruction::GrantCapability {
                capability: Capability::Slash,
                account: [5u8; 32],
            })
        );

        let cli = parse("revoke", "pause").unwrap();
        assert_eq!(
            instruction_for(&cli.command).unwrap(),
            Some(StakingInstruction::RevokeCapability {
                capability: Capability::Pause,
                account: [5u8; 32],
            })
        );

        assert!(parse("grant", "mint").is_err());
    }

    #[test]
    fn revoked_slasher_cannot_slash() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = generate_keypair();
        let me = address_of(&key);
        init_ledger(&store, &me, None, 10 * UNIT, T0).unwrap();

        let revoke = StakingInstruction::RevokeCapability {
            capability: Capability::Slash,
            account: me,
        };
        let events = apply_local(&store, &key, revoke, T0).unwrap();
        assert_eq!(
            events,
            vec![StakingEvent::CapabilityRevoked {
                capability: Capability::Slash,
                account: me,
            }]
        );

        let slash = StakingInstruction::Slash {
            self_stakers: vec![me],
            community_stakers: vec![],
            community_stakees: vec![],
            percent: 10,
        };
        let err = apply_local(&store, &key, slash, T0 + 1).unwrap_err();
        assert!(err.to_string().contains("slash capability"));
    }

    #[test]
    fn rejected_local_instruction_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        let key = generate_keypair();
        init_ledger(&store, &address_of(&key), None, 0, T0).unwrap();
        let before = store.load_snapshot().unwrap();

        let stake = StakingInstruction::SelfStake {
            amount: UNIT,
            duration: 12 * SECONDS_PER_WEEK,
        };
        assert!(apply_local(&store, &key, stake, T0).is_err());
        assert_eq!(store.load_snapshot().unwrap(), before);
    }
}
