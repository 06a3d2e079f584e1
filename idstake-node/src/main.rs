use anyhow::{bail, Context, Result};
use clap::Parser;
use idstake_api::AppState;
use idstake_genesis::{create_genesis_state, GenesisConfig};
use idstake_node::{system_time, LedgerService};
use idstake_types::{parse_address, NULL_ADDRESS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,
    /// Genesis JSON used when the data directory holds no ledger yet.
    #[arg(short, long)]
    genesis: Option<PathBuf>,
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
    /// Seconds between checks for a round that is ready to close.
    #[arg(long, default_value_t = 60)]
    keeper_interval: u64,
    /// Account recorded as the caller of keeper-driven round advances.
    #[arg(long)]
    keeper: Option<String>,
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    info!("Starting IdStake Node...");

    // 2. Init Storage
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("Failed to create {}", args.data_dir.display()))?;
    let store: Arc<dyn idstake_storage::StateStore> = Arc::from(
        idstake_storage::open(&args.data_dir).context("Failed to initialize storage")?,
    );
    info!("Storage initialized at {}", args.data_dir.display());

    // 3. Load or Create State
    let snapshot = match store.load_snapshot()? {
        Some(snapshot) => {
            info!(
                round = snapshot.state.clock.current_round,
                "Loaded existing ledger"
            );
            snapshot
        }
        None => {
            let Some(path) = &args.genesis else {
                bail!("No ledger in {} and no --genesis given", args.data_dir.display());
            };
            info!("Ledger is empty, applying genesis from {}", path.display());
            let genesis = create_genesis_state(&GenesisConfig::load(path)?)?;
            store.save_snapshot(&genesis).context("Failed to save genesis state")?;
            genesis
        }
    };
    if let Err(e) = snapshot.state.check_invariants() {
        error!("Loaded ledger is inconsistent: {}", e);
    }
    info!(root = %hex::encode(snapshot.state.root_hash()), "Ledger ready");

    let shared = Arc::new(RwLock::new(snapshot));
    let keeper = match &args.keeper {
        Some(s) => parse_address(s).context("Invalid --keeper")?,
        None => NULL_ADDRESS,
    };

    // 4. Init Ledger Service
    let (tx_sender, tx_receiver) = mpsc::channel(1000);
    let service = LedgerService::new(
        shared.clone(),
        store,
        tx_receiver,
        keeper,
        Duration::from_secs(args.keeper_interval.max(1)),
        system_time(),
    );
    tokio::spawn(service.run());

    // 5. Init API
    let api_state = AppState {
        snapshot: shared,
        tx_sender,
    };
    let listen = args.listen;
    tokio::spawn(async move {
        if let Err(e) = idstake_api::start_server(listen, api_state).await {
            error!("API server stopped: {}", e);
        }
    });

    info!("Node running. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;

    Ok(())
}
