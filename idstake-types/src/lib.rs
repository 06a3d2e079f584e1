pub mod access;
pub mod custody;
pub mod event;
pub mod instruction;
pub mod params;
pub mod stake;
pub mod state;
pub mod transaction;

pub use access::{Capability, RoleRegistry};
pub use custody::TokenLedger;
pub use event::StakingEvent;
pub use instruction::StakingInstruction;
pub use stake::{Stake, StakeKey};
pub use state::{LedgerSnapshot, LedgerState, Lifecycle, RoundClock};
pub use transaction::Transaction;

/// Account identifier. Matches the ed25519 verifying key of the account holder.
pub type Address = [u8; 32];

/// The all-zero account, never a valid stakee or release target.
pub const NULL_ADDRESS: Address = [0u8; 32];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AddressError {
    #[error("address must be 32 bytes of hex, got {0} bytes")]
    Length(usize),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

pub fn parse_address(s: &str) -> Result<Address, AddressError> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x"))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| AddressError::Length(len))
}

pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}
