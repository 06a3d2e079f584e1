use crate::custodian::CustodianError;
use idstake_types::access::{AccessError, Capability};
use thiserror::Error;

/// Why an operation was rejected. Every variant means no state changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StakingError {
    // Validation
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("invalid account identifier")]
    InvalidAccount,
    #[error("cannot community-stake on yourself")]
    SelfTarget,
    #[error("community targets mismatched: {stakers} stakers, {stakees} stakees")]
    MismatchedTargets { stakers: usize, stakees: usize },
    #[error("slash percent {0} outside 1..=100")]
    InvalidPercent(u64),

    // Policy
    #[error("lock duration of {duration}s is outside the allowed range")]
    InvalidLockDuration { duration: u64 },
    #[error("unlock time {requested} would shorten the lock ending at {current}")]
    LockShortened { current: u64, requested: u64 },
    #[error("no active stake to extend")]
    NoActiveStake,
    #[error("stake is locked until {unlock_time}")]
    StakeLocked { unlock_time: u64 },
    #[error("withdrawal of {requested} exceeds staked amount {available}")]
    InsufficientStake { requested: u128, available: u128 },
    #[error("round {round} cannot close before {ready_at}")]
    RoundNotElapsed { round: u64, ready_at: u64 },
    #[error("round {round} has already been burned")]
    RoundAlreadyBurned { round: u64 },
    #[error("slashed funds are parked in round {actual}, not {requested}")]
    WrongSlashRound { requested: u64, actual: u64 },
    #[error("release of {requested} exceeds slashed amount {available}")]
    ReleaseExceedsSlashed { requested: u128, available: u128 },
    #[error("ledger is paused")]
    Paused,
    #[error("ledger is not paused")]
    NotPaused,

    // Authorization
    #[error("{caller} lacks the {capability} capability")]
    Unauthorized { caller: String, capability: Capability },
    #[error(transparent)]
    Access(#[from] AccessError),

    // Collaborators
    #[error("custodian rejected transfer: {0}")]
    Custodian(#[from] CustodianError),

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    // Envelope
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("invalid transaction signature")]
    InvalidSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Policy,
    Authorization,
    Custodian,
    Arithmetic,
    Envelope,
}

impl StakingError {
    pub fn kind(&self) -> ErrorKind {
        use StakingError::*;
        match self {
            ZeroAmount | InvalidAccount | SelfTarget | MismatchedTargets { .. }
            | InvalidPercent(_) => ErrorKind::Validation,
            InvalidLockDuration { .. }
            | LockShortened { .. }
            | NoActiveStake
            | StakeLocked { .. }
            | InsufficientStake { .. }
            | RoundNotElapsed { .. }
            | RoundAlreadyBurned { .. }
            | WrongSlashRound { .. }
            | ReleaseExceedsSlashed { .. }
            | Paused
            | NotPaused => ErrorKind::Policy,
            Unauthorized { .. } | Access(_) => ErrorKind::Authorization,
            Custodian(_) => ErrorKind::Custodian,
            Overflow(_) => ErrorKind::Arithmetic,
            InvalidNonce { .. } | InvalidSignature => ErrorKind::Envelope,
        }
    }
}

pub type Result<T, E = StakingError> = std::result::Result<T, E>;
