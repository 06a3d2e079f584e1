pub mod auth;
pub mod custodian;
pub mod error;
pub mod ledger;
pub mod lifecycle;
mod math;
pub mod release;
pub mod roles;
pub mod rounds;
pub mod slashing;


pub use auth::AuthorizationGate;
pub use custodian::{CustodianError, TokenCustodian};
pub use error::{ErrorKind, StakingError};

use error::Result;
use idstake_types::instruction::StakingInstruction;
use idstake_types::state::{LedgerSnapshot, LedgerState, Lifecycle};
use idstake_types::transaction::Transaction;
use idstake_types::{format_address, Address, StakingEvent};
use tracing::{debug, warn};

/// Everything one operation may touch. Operations validate fully and call the custodian before
/// writing to `state`, so a returned error leaves every field unchanged.
pub struct ExecutionContext<'a> {
    pub state: &'a mut LedgerState,
    pub lifecycle: &'a mut Lifecycle,
    pub custodian: &'a mut dyn TokenCustodian,
    pub gate: &'a mut dyn AuthorizationGate,
    pub timestamp: u64,
    pub events: Vec<StakingEvent>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        state: &'a mut LedgerState,
        lifecycle: &'a mut Lifecycle,
        custodian: &'a mut dyn TokenCustodian,
        gate: &'a mut dyn AuthorizationGate,
        timestamp: u64,
    ) -> Self {
        Self {
            state,
            lifecycle,
            custodian,
            gate,
            timestamp,
            events: Vec::new(),
        }
    }

    /// Context over a whole snapshot, using its role registry as the gate and its token ledger
    /// as the custodian.
    pub fn from_snapshot(snapshot: &'a mut LedgerSnapshot, timestamp: u64) -> Self {
        let LedgerSnapshot {
            state,
            lifecycle,
            roles,
            custody,
        } = snapshot;
        Self::new(state, lifecycle, custody, roles, timestamp)
    }

    pub fn take_events(&mut self) -> Vec<StakingEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: StakingEvent) {
        debug!(?event, "ledger event");
        self.events.push(event);
    }
}

pub fn execute_transaction(tx: &Transaction, ctx: &mut ExecutionContext) -> Result<()> {
    // 1. Verify Signature
    if let Err(e) = idstake_crypto::signatures::verify_transaction(tx) {
        warn!(sender = %format_address(&tx.sender), "rejected transaction: {}", e);
        return Err(StakingError::InvalidSignature);
    }

    // 2. Check Nonce
    let expected = ctx.state.nonce(&tx.sender);
    if tx.nonce != expected {
        return Err(StakingError::InvalidNonce {
            expected,
            got: tx.nonce,
        });
    }

    // 3. Increment Nonce; a signed transaction is spent even if its instruction is rejected
    ctx.state.nonces.insert(tx.sender, expected + 1);

    // 4. Execute Instruction
    execute_instruction(&tx.instruction, &tx.sender, ctx)
}

pub fn execute_instruction(
    si: &StakingInstruction,
    sender: &Address,
    ctx: &mut ExecutionContext,
) -> Result<()> {
    let result = dispatch(si, sender, ctx);
    if let Err(e) = &result {
        warn!(
            instruction = si.name(),
            sender = %format_address(sender),
            kind = ?e.kind(),
            "instruction rejected: {}",
            e
        );
    }
    result
}

fn dispatch(si: &StakingInstruction, sender: &Address, ctx: &mut ExecutionContext) -> Result<()> {
    match si {
        StakingInstruction::Pause => return lifecycle::pause(ctx, sender),
        StakingInstruction::Unpause => return lifecycle::unpause(ctx, sender),
        StakingInstruction::GrantCapability {
            capability,
            account,
        } => return roles::grant_capability(ctx, sender, *capability, account),
        StakingInstruction::RevokeCapability {
            capability,
            account,
        } => return roles::revoke_capability(ctx, sender, *capability, account),
        _ => lifecycle::ensure_not_paused(ctx)?,
    }

    match si {
        StakingInstruction::SelfStake { amount, duration } => {
            ledger::self_stake(ctx, sender, *amount, *duration)
        }
        StakingInstruction::ExtendSelfStake { duration } => {
            ledger::extend_self_stake(ctx, sender, *duration)
        }
        StakingInstruction::WithdrawSelfStake { amount } => {
            ledger::withdraw_self_stake(ctx, sender, *amount)
        }
        StakingInstruction::CommunityStake {
            stakee,
            amount,
            duration,
        } => ledger::community_stake(ctx, sender, stakee, *amount, *duration),
        StakingInstruction::ExtendCommunityStake { stakee, duration } => {
            ledger::extend_community_stake(ctx, sender, stakee, *duration)
        }
        StakingInstruction::WithdrawCommunityStake { stakee, amount } => {
            ledger::withdraw_community_stake(ctx, sender, stakee, *amount)
        }
        StakingInstruction::Slash {
            self_stakers,
            community_stakers,
            community_stakees,
            percent,
        } => slashing::slash(
            ctx,
            sender,
            self_stakers,
            community_stakers,
            community_stakees,
            *percent,
        ),
        StakingInstruction::AdvanceRound => rounds::advance_round(ctx).map(|_| ()),
        StakingInstruction::Release {
            staker,
            stakee,
            amount,
            slash_round,
        } => release::release(ctx, sender, staker, stakee, *amount, *slash_round),
        StakingInstruction::Pause
        | StakingInstruction::Unpause
        | StakingInstruction::GrantCapability { .. }
        | StakingInstruction::RevokeCapability { .. } => Ok(()),
    }
}
