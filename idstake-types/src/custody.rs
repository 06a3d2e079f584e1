use crate::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token balances held outside the staking ledger, plus the pool the ledger has taken into
/// custody and the cumulative amount burned from it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLedger {
    pub balances: BTreeMap<Address, u128>,
    pub custody: u128,
    pub burned: u128,
}

impl TokenLedger {
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Adds spendable balance to an account, as a mint or airdrop would.
    pub fn credit(&mut self, account: Address, amount: u128) -> Option<u128> {
        let balance = self.balances.entry(account).or_default();
        *balance = balance.checked_add(amount)?;
        Some(*balance)
    }
}
