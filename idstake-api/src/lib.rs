use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use idstake_types::stake::Stake;
use idstake_types::state::LedgerSnapshot;
use idstake_types::transaction::Transaction;
use idstake_types::{format_address, parse_address, Address, StakingEvent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tower_http::cors::CorsLayer;
use tracing::info;

/// A transaction handed to the ledger writer together with the channel its outcome goes back on.
pub struct Submission {
    pub tx: Transaction,
    pub reply: oneshot::Sender<Result<Receipt, Rejection>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_id: String,
    pub events: Vec<StakingEvent>,
    pub root_hash: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: String,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccountView {
    pub address: String,
    pub self_stake: Stake,
    pub total_staked: u128,
    pub nonce: u64,
    /// Community positions this account holds, keyed by stakee.
    pub community: BTreeMap<String, Stake>,
    /// Community positions other accounts hold on this one, keyed by staker.
    pub backers: BTreeMap<String, Stake>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoundView {
    pub current_round: u64,
    pub last_advance_time: u64,
    pub next_advance_at: u64,
    pub round_to_burn: u64,
    /// Buckets that can still be burned or released from.
    pub pending: BTreeMap<u64, u128>,
    pub paused: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub snapshot: Arc<RwLock<LedgerSnapshot>>,
    pub tx_sender: mpsc::Sender<Submission>,
}

type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/tx", post(submit_tx))
        .route("/stake/:address", get(get_account))
        .route("/community/:staker/:stakee", get(get_community))
        .route("/round", get(get_round))
        .route("/nonce/:address", get(get_nonce))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", addr);
    axum::serve(listener, router(state)).await
}

fn address(s: &str) -> Result<Address, ApiError> {
    parse_address(s).map_err(|e| (StatusCode::BAD_REQUEST, format!("{}: {}", s, e)))
}

async fn root() -> &'static str {
    "IdStake ledger API v0.1"
}

async fn submit_tx(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> Result<Json<Receipt>, (StatusCode, Json<Rejection>)> {
    let unavailable = || {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Rejection {
                kind: "Unavailable".into(),
                message: "ledger service is not running".into(),
            }),
        )
    };

    let (reply, outcome) = oneshot::channel();
    state
        .tx_sender
        .send(Submission { tx, reply })
        .await
        .map_err(|_| unavailable())?;

    match outcome.await.map_err(|_| unavailable())? {
        Ok(receipt) => Ok(Json(receipt)),
        Err(rejection) => Err((StatusCode::UNPROCESSABLE_ENTITY, Json(rejection))),
    }
}

async fn get_account(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<AccountView>, ApiError> {
    let account = address(&account)?;
    let guard = state.snapshot.read().await;
    Ok(Json(account_view(&guard, &account)))
}

async fn get_community(
    State(state): State<AppState>,
    Path((staker, stakee)): Path<(String, String)>,
) -> Result<Json<Stake>, ApiError> {
    let staker = address(&staker)?;
    let stakee = address(&stakee)?;
    let guard = state.snapshot.read().await;
    Ok(Json(guard.state.community_stake(&staker, &stakee)))
}

async fn get_round(State(state): State<AppState>) -> Json<RoundView> {
    let guard = state.snapshot.read().await;
    Json(round_view(&guard))
}

async fn get_nonce(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Json<u64>, ApiError> {
    let account = address(&account)?;
    let guard = state.snapshot.read().await;
    Ok(Json(guard.state.nonce(&account)))
}

pub fn account_view(snapshot: &LedgerSnapshot, account: &Address) -> AccountView {
    let ledger = &snapshot.state;
    let community = ledger
        .community_stakes
        .range((*account, [0u8; 32])..=(*account, [0xffu8; 32]))
        .map(|((_, stakee), stake)| (format_address(stakee), *stake))
        .collect();
    let backers = ledger
        .stakes_on(account)
        .into_iter()
        .map(|(staker, stake)| (format_address(&staker), stake))
        .collect();

    AccountView {
        address: format_address(account),
        self_stake: ledger.self_stake(account),
        total_staked: ledger.total_staked(account),
        nonce: ledger.nonce(account),
        community,
        backers,
    }
}

pub fn round_view(snapshot: &LedgerSnapshot) -> RoundView {
    let clock = snapshot.state.clock;
    let pending = snapshot
        .state
        .slashed_per_round
        .range(clock.round_to_burn().max(1)..=clock.current_round)
        .map(|(round, amount)| (*round, *amount))
        .collect();

    RoundView {
        current_round: clock.current_round,
        last_advance_time: clock.last_advance_time,
        next_advance_at: clock.next_advance_at(),
        round_to_burn: clock.round_to_burn(),
        pending,
        paused: snapshot.lifecycle.paused,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_types::instruction::StakingInstruction;
    use idstake_types::stake::StakeKey;

    fn app(snapshot: LedgerSnapshot) -> (AppState, mpsc::Receiver<Submission>) {
        let (tx_sender, rx) = mpsc::channel(8);
        let state = AppState {
            snapshot: Arc::new(RwLock::new(snapshot)),
            tx_sender,
        };
        (state, rx)
    }

    #[tokio::test]
    async fn account_view_lists_positions() {
        let mut snapshot = LedgerSnapshot::default();
        let alice = [1u8; 32];
        let stake = Stake {
            amount: 40,
            unlock_time: 99,
            ..Default::default()
        };
        snapshot.state.set_stake(StakeKey::SelfStake(alice), stake);
        snapshot.state.set_stake(
            StakeKey::Community {
                staker: alice,
                stakee: [2u8; 32],
            },
            stake,
        );
        snapshot.state.set_stake(
            StakeKey::Community {
                staker: [3u8; 32],
                stakee: alice,
            },
            stake,
        );
        snapshot.state.total_staked.insert(alice, 80);
        let (state, _rx) = app(snapshot);

        let Json(view) = get_account(State(state), Path(format_address(&alice)))
            .await
            .unwrap();
        assert_eq!(view.self_stake, stake);
        assert_eq!(view.total_staked, 80);
        assert_eq!(view.community.len(), 1);
        assert!(view.community.contains_key(&format_address(&[2u8; 32])));
        assert_eq!(view.backers.len(), 1);
        assert_eq!(view.backers.get(&format_address(&[3u8; 32])), Some(&stake));
    }

    #[tokio::test]
    async fn malformed_address_is_bad_request() {
        let (state, _rx) = app(LedgerSnapshot::default());
        let err = get_nonce(State(state), Path("0xabc".into())).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn round_view_hides_burned_buckets() {
        let mut snapshot = LedgerSnapshot::default();
        snapshot.state.clock.current_round = 4;
        snapshot.state.slashed_per_round.insert(2, 7);
        snapshot.state.slashed_per_round.insert(3, 5);
        snapshot.state.slashed_per_round.insert(4, 1);

        let view = round_view(&snapshot);
        assert_eq!(view.round_to_burn, 3);
        assert_eq!(view.pending.into_iter().collect::<Vec<_>>(), vec![(3, 5), (4, 1)]);
    }

    #[tokio::test]
    async fn submission_reaches_writer_and_returns_outcome() {
        let (state, mut rx) = app(LedgerSnapshot::default());
        tokio::spawn(async move {
            while let Some(submission) = rx.recv().await {
                let _ = submission.reply.send(Err(Rejection {
                    kind: "Envelope".into(),
                    message: "transaction signature is invalid".into(),
                }));
            }
        });

        let tx = Transaction {
            sender: [1u8; 32],
            nonce: 0,
            instruction: StakingInstruction::AdvanceRound,
            signature: vec![],
        };
        let (status, Json(rejection)) = submit_tx(State(state), Json(tx)).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejection.kind, "Envelope");
    }

    #[tokio::test]
    async fn closed_writer_is_unavailable() {
        let (state, rx) = app(LedgerSnapshot::default());
        drop(rx);
        let tx = Transaction {
            sender: [1u8; 32],
            nonce: 0,
            instruction: StakingInstruction::AdvanceRound,
            signature: vec![],
        };
        let (status, _) = submit_tx(State(state), Json(tx)).await.unwrap_err();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
