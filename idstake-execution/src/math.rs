use crate::error::{Result, StakingError};
use idstake_types::params::MAX_PERCENT;

pub(crate) fn add(a: u128, b: u128, what: &'static str) -> Result<u128> {
    a.checked_add(b).ok_or(StakingError::Overflow(what))
}

pub(crate) fn sub(a: u128, b: u128, what: &'static str) -> Result<u128> {
    a.checked_sub(b).ok_or(StakingError::Overflow(what))
}

/// `floor(percent * amount / 100)`.
pub(crate) fn percent_of(amount: u128, percent: u64) -> Result<u128> {
    let scaled = amount
        .checked_mul(u128::from(percent))
        .ok_or(StakingError::Overflow("slash delta"))?;
    Ok(scaled / u128::from(MAX_PERCENT))
}
