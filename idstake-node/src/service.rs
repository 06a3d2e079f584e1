//! Single writer over the ledger. Transactions arrive on a channel and are applied one at a time
//! to a working copy of the snapshot; the copy replaces the shared snapshot only after it has
//! been persisted.

use idstake_api::{Receipt, Rejection, Submission};
use idstake_execution::{execute_instruction, execute_transaction, ExecutionContext, StakingError};
use idstake_storage::StateStore;
use idstake_types::instruction::StakingInstruction;
use idstake_types::state::LedgerSnapshot;
use idstake_types::transaction::Transaction;
use idstake_types::{format_address, Address, StakingEvent};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

pub type TimeSource = Arc<dyn Fn() -> u64 + Send + Sync>;

pub fn system_time() -> TimeSource {
    Arc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    })
}

pub struct LedgerService {
    snapshot: Arc<RwLock<LedgerSnapshot>>,
    store: Arc<dyn StateStore>,
    tx_rx: mpsc::Receiver<Submission>,
    keeper: Address,
    keeper_interval: Duration,
    now: TimeSource,
}

impl LedgerService {
    pub fn new(
        snapshot: Arc<RwLock<LedgerSnapshot>>,
        store: Arc<dyn StateStore>,
        tx_rx: mpsc::Receiver<Submission>,
        keeper: Address,
        keeper_interval: Duration,
        now: TimeSource,
    ) -> Self {
        Self {
            snapshot,
            store,
            tx_rx,
            keeper,
            keeper_interval,
            now,
        }
    }

    pub async fn run(mut self) {
        info!(
            keeper = %format_address(&self.keeper),
            interval_secs = self.keeper_interval.as_secs(),
            "Starting ledger service"
        );
        let mut interval = tokio::time::interval(self.keeper_interval);

        loop {
            tokio::select! {
                submission = self.tx_rx.recv() => {
                    let Some(Submission { tx, reply }) = submission else {
                        info!("Submission channel closed, stopping ledger service");
                        break;
                    };
                    let outcome = self.submit(&tx).await;
                    let _ = reply.send(outcome);
                }
                _ = interval.tick() => {
                    if let Err(e) = self.keep().await {
                        error!(kind = %e.kind, "Round keeper failed: {}", e.message);
                    }
                }
            }
        }
    }

    pub async fn submit(&self, tx: &Transaction) -> Result<Receipt, Rejection> {
        let now = (self.now)();
        let (events, root) = self
            .commit(now, |ctx| execute_transaction(tx, ctx))
            .await?;
        let receipt = Receipt {
            tx_id: hex::encode(tx.id()),
            events,
            root_hash: hex::encode(root),
        };
        info!(
            tx = %receipt.tx_id,
            sender = %format_address(&tx.sender),
            instruction = tx.instruction.name(),
            "Applied transaction"
        );
        Ok(receipt)
    }

    /// Closes the current round once its minimum duration has passed. Returns whether it did.
    pub async fn keep(&self) -> Result<bool, Rejection> {
        let now = (self.now)();
        {
            let guard = self.snapshot.read().await;
            if guard.lifecycle.paused || now < guard.state.clock.next_advance_at() {
                return Ok(false);
            }
        }

        let keeper = self.keeper;
        let (events, root) = self
            .commit(now, |ctx| {
                execute_instruction(&StakingInstruction::AdvanceRound, &keeper, ctx)
            })
            .await?;
        for event in &events {
            if let StakingEvent::Burn { round, amount } = event {
                info!(round, amount, root = %hex::encode(root), "Keeper closed round");
            }
        }
        Ok(true)
    }

    async fn commit(
        &self,
        now: u64,
        apply: impl FnOnce(&mut ExecutionContext) -> Result<(), StakingError>,
    ) -> Result<(Vec<StakingEvent>, [u8; 32]), Rejection> {
        let mut guard = self.snapshot.write().await;
        let mut next = guard.clone();

        let (result, events) = {
            let mut ctx = ExecutionContext::from_snapshot(&mut next, now);
            let result = apply(&mut ctx);
            (result, ctx.take_events())
        };
        // A rejected instruction inside a valid envelope still spends the sender's nonce.
        if let Err(e) = &result {
            if next == *guard {
                return Err(rejection(e.clone()));
            }
        }

        let store = self.store.clone();
        let (next, saved) = tokio::task::spawn_blocking(move || {
            let saved = store.save_snapshot(&next);
            (next, saved)
        })
        .await
        .map_err(|e| Rejection {
            kind: "Storage".into(),
            message: e.to_string(),
        })?;
        if let Err(e) = saved {
            error!("Failed to persist ledger, dropping change: {}", e);
            return Err(Rejection {
                kind: "Storage".into(),
                message: e.to_string(),
            });
        }
        if let Err(e) = next.state.check_invariants() {
            warn!("Ledger invariant violated after commit: {}", e);
        }

        let root = next.state.root_hash();
        *guard = next;
        result.map_err(rejection)?;
        Ok((events, root))
    }
}

fn rejection(e: StakingError) -> Rejection {
    Rejection {
        kind: format!("{:?}", e.kind()),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idstake_crypto::signatures::{address_of, generate_keypair, sign_transaction, SigningKey};
    use idstake_genesis::{create_genesis_state, GenesisBalance, GenesisConfig};
    use idstake_storage::MemoryStore;
    use idstake_types::params::{DEFAULT_ROUND_DURATION, MIN_LOCK_DURATION, UNIT};
    use idstake_types::NULL_ADDRESS;
    use std::sync::atomic::{AtomicU64, Ordering};

    const T0: u64 = 1_700_000_000;

    struct Fixture {
        service: LedgerService,
        snapshot: Arc<RwLock<LedgerSnapshot>>,
        store: Arc<MemoryStore>,
        clock: Arc<AtomicU64>,
        key: SigningKey,
    }

    fn fixture() -> Fixture {
        let key = generate_keypair();
        let me = address_of(&key);
        let mut config = GenesisConfig::dev(&me, T0);
        config.balances.push(GenesisBalance {
            account: format_address(&me),
            amount: "100".into(),
        });

        let snapshot = Arc::new(RwLock::new(create_genesis_state(&config).unwrap()));
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(AtomicU64::new(T0));
        let now = {
            let clock = clock.clone();
            Arc::new(move || clock.load(Ordering::SeqCst)) as TimeSource
        };
        let (_tx, rx) = mpsc::channel(1);
        let service = LedgerService::new(
            snapshot.clone(),
            store.clone(),
            rx,
            NULL_ADDRESS,
            Duration::from_secs(1),
            now,
        );
        Fixture {
            service,
            snapshot,
            store,
            clock,
            key,
        }
    }

    fn signed(f: &Fixture, nonce: u64, instruction: StakingInstruction) -> Transaction {
        let mut tx = Transaction {
            sender: address_of(&f.key),
            nonce,
            instruction,
            signature: vec![],
        };
        sign_transaction(&f.key, &mut tx);
        tx
    }

    #[tokio::test]
    async fn applied_transaction_is_persisted() {
        let f = fixture();
        let tx = signed(
            &f,
            0,
            StakingInstruction::SelfStake {
                amount: 10 * UNIT,
                duration: MIN_LOCK_DURATION,
            },
        );

        let receipt = f.service.submit(&tx).await.unwrap();
        assert_eq!(receipt.events.len(), 1);

        let shared = f.snapshot.read().await.clone();
        assert_eq!(hex::encode(shared.state.root_hash()), receipt.root_hash);
        assert_eq!(f.store.load_snapshot().unwrap(), Some(shared));
    }

    #[tokio::test]
    async fn rejected_instruction_spends_only_the_nonce() {
        let f = fixture();
        let me = address_of(&f.key);
        let before = f.snapshot.read().await.clone();
        let tx = signed(
            &f,
            0,
            StakingInstruction::SelfStake {
                amount: 1_000 * UNIT,
                duration: MIN_LOCK_DURATION,
            },
        );

        let rejection = f.service.submit(&tx).await.unwrap_err();
        assert_eq!(rejection.kind, "Custodian");

        let after = f.snapshot.read().await.clone();
        assert_eq!(after.state.nonce(&me), 1);
        assert_eq!(after.state.self_stake(&me), before.state.self_stake(&me));
        assert_eq!(after.custody, before.custody);
        assert_eq!(f.store.load_snapshot().unwrap(), Some(after.clone()));

        let replay = f.service.submit(&tx).await.unwrap_err();
        assert_eq!(replay.kind, "Envelope");
        assert_eq!(*f.snapshot.read().await, after);
    }

    #[tokio::test]
    async fn rejected_envelope_changes_nothing() {
        let f = fixture();
        let before = f.snapshot.read().await.clone();

        let wrong_nonce = signed(&f, 5, StakingInstruction::AdvanceRound);
        assert_eq!(f.service.submit(&wrong_nonce).await.unwrap_err().kind, "Envelope");
        assert_eq!(*f.snapshot.read().await, before);
        assert!(f.store.load_snapshot().unwrap().is_none());
    }

    #[tokio::test]
    async fn keeper_waits_for_round_duration() {
        let f = fixture();
        assert!(!f.service.keep().await.unwrap());

        f.clock.store(T0 + DEFAULT_ROUND_DURATION, Ordering::SeqCst);
        assert!(f.service.keep().await.unwrap());
        assert_eq!(f.snapshot.read().await.state.clock.current_round, 2);
        assert!(!f.service.keep().await.unwrap());
    }

    #[tokio::test]
    async fn keeper_skips_while_paused() {
        let f = fixture();
        f.service
            .submit(&signed(&f, 0, StakingInstruction::Pause))
            .await
            .unwrap();

        f.clock.store(T0 + DEFAULT_ROUND_DURATION, Ordering::SeqCst);
        assert!(!f.service.keep().await.unwrap());
        assert_eq!(f.snapshot.read().await.state.clock.current_round, 1);
    }
}
